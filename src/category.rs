//! Extension-based file categorization.
//!
//! This module maps file extensions to broader category labels (e.g. "images",
//! "documents"). The mapping lives in a [`CategoryTable`] value that is built
//! once and injected wherever files are classified, so tests and configuration
//! files can swap in their own table.
//!
//! # Examples
//!
//! ```
//! use tidytree::category::CategoryTable;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.category(".jpg"), "images");
//! assert_eq!(table.category("PDF"), "documents");
//! assert_eq!(table.category(".unknownext"), "other");
//! ```

use crate::config::ConfigError;
use std::collections::HashMap;

/// Label used for files whose extension is not in the table.
pub const DEFAULT_FALLBACK: &str = "other";

/// Built-in category lists, in directory-name form.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "images",
        &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg", "ico"],
    ),
    (
        "documents",
        &["pdf", "doc", "docx", "txt", "xls", "xlsx", "ppt", "pptx", "md", "rtf"],
    ),
    ("audio", &["mp3", "wav", "flac", "aac", "m4a", "wma", "ogg"]),
    ("videos", &["mp4", "avi", "mkv", "mov", "wmv", "flv", "m4v", "webm"]),
    ("archives", &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
    (
        "code",
        &["py", "js", "java", "cpp", "c", "h", "html", "css", "php", "json", "xml", "yml"],
    ),
    ("installers", &["msi", "dmg", "pkg", "deb", "rpm", "apk"]),
    ("fonts", &["ttf", "otf", "woff", "woff2", "eot"]),
    ("ebooks", &["epub", "mobi", "azw3"]),
    ("design", &["psd", "ai", "sketch", "fig", "xd"]),
    ("executables", &["exe"]),
];

/// Normalizes an extension to lower case with a single leading dot.
///
/// The empty string stays empty.
///
/// ```
/// use tidytree::category::normalize_extension;
///
/// assert_eq!(normalize_extension("JPG"), ".jpg");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

/// Maps file extensions to category names.
///
/// Every extension maps to exactly one category; anything else falls back
/// to a single fallback label.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    extension_map: HashMap<String, String>,
    fallback: String,
}

impl CategoryTable {
    /// Creates an empty table where everything maps to `fallback`.
    pub fn empty(fallback: impl Into<String>) -> Self {
        Self {
            extension_map: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// Creates a table with the built-in mappings.
    pub fn new() -> Self {
        let mut table = Self::empty(DEFAULT_FALLBACK);
        for (category, extensions) in DEFAULT_CATEGORIES {
            for ext in *extensions {
                table.add_extension_mapping(ext, category);
            }
        }
        table
    }

    /// Adds or replaces a single extension mapping.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) {
        self.extension_map
            .insert(normalize_extension(ext), category.to_string());
    }

    /// Adds a whole category, refusing extensions already claimed by a
    /// different category.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateExtension` if an extension is already
    /// mapped to another category.
    pub fn try_add_category<S: AsRef<str>>(
        &mut self,
        category: &str,
        extensions: &[S],
    ) -> Result<(), ConfigError> {
        for ext in extensions {
            let key = normalize_extension(ext.as_ref());
            if key.is_empty() {
                continue;
            }
            match self.extension_map.get(&key) {
                Some(existing) if existing != category => {
                    return Err(ConfigError::DuplicateExtension {
                        extension: key,
                        first: existing.clone(),
                        second: category.to_string(),
                    });
                }
                _ => {
                    self.extension_map.insert(key, category.to_string());
                }
            }
        }
        Ok(())
    }

    /// Replaces the fallback label.
    pub fn set_fallback(&mut self, fallback: &str) {
        self.fallback = fallback.to_string();
    }

    /// The label returned for unmapped extensions.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Returns the category for an extension, with or without leading dot.
    pub fn category(&self, ext: &str) -> &str {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Returns all category names including the fallback, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extension_map.values().map(String::as_str).collect();
        names.push(&self.fallback);
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
    }
}
