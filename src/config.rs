//! Configuration file support.
//!
//! Settings are loaded from a TOML file and cover the default options of
//! every operation, the category table, and file filtering rules:
//!
//! ```toml
//! [organize]
//! mode = "type"          # "type", "date" or "size"
//! dry_run = false
//! backup = true
//!
//! [duplicates]
//! strategy = "content"   # "name_size" or "content"
//!
//! [cleanup]
//! preview_only = true
//!
//! [rename]
//! template = "file_{num:03d}{ext}"
//! start_number = 1
//!
//! [categories]
//! fallback = "other"
//! replace_defaults = false
//!
//! [categories.map]
//! notes = ["md", "org"]
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::category::CategoryTable;
use crate::duplicates::DuplicateStrategy;
use crate::organizer::Mode;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Default rename template.
pub const DEFAULT_RENAME_TEMPLATE: &str = "file_{num:03d}{ext}";

/// Errors that can occur during configuration loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// One extension was assigned to two categories.
    #[error("Extension '{extension}' is mapped to both '{first}' and '{second}'")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Everything a configuration file can set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidyConfig {
    #[serde(default)]
    pub organize: OrganizeSettings,
    #[serde(default)]
    pub duplicates: DuplicateSettings,
    #[serde(default)]
    pub cleanup: CleanupSettings,
    #[serde(default)]
    pub rename: RenameSettings,
    #[serde(default)]
    pub categories: CategorySettings,
    #[serde(default)]
    pub filters: FilterRules,
}

/// Defaults for organize runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeSettings {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub backup: bool,
}

/// Defaults for duplicate searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateSettings {
    #[serde(default)]
    pub strategy: DuplicateStrategy,
}

/// Defaults for empty-directory cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    #[serde(default = "default_true")]
    pub preview_only: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self { preview_only: true }
    }
}

/// Defaults for batch renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameSettings {
    #[serde(default = "default_rename_template")]
    pub template: String,
    #[serde(default = "default_start_number")]
    pub start_number: u64,
}

impl Default for RenameSettings {
    fn default() -> Self {
        Self {
            template: default_rename_template(),
            start_number: default_start_number(),
        }
    }
}

/// Category table customization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorySettings {
    /// Label for unmapped extensions. Defaults to "other".
    #[serde(default)]
    pub fallback: Option<String>,
    /// If true, only `map` is used; otherwise `map` is layered over the
    /// built-in table.
    #[serde(default)]
    pub replace_defaults: bool,
    /// Category name to extension list.
    #[serde(default)]
    pub map: BTreeMap<String, Vec<String>>,
}

impl CategorySettings {
    /// Builds the category table described by these settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateExtension` if `map` assigns one
    /// extension to two categories.
    pub fn build_table(&self) -> Result<CategoryTable, ConfigError> {
        let fallback = self
            .fallback
            .as_deref()
            .unwrap_or(crate::category::DEFAULT_FALLBACK);

        let mut custom = CategoryTable::empty(fallback);
        for (category, extensions) in &self.map {
            custom.try_add_category(category, extensions)?;
        }
        if self.replace_defaults {
            return Ok(custom);
        }

        let mut table = CategoryTable::default();
        table.set_fallback(fallback);
        for (category, extensions) in &self.map {
            for ext in extensions {
                table.add_extension_mapping(ext, category);
            }
        }
        Ok(table)
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden and transient files (names starting with
    /// "." or "~"). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from every operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp", "node_modules/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "bak", "tmp", "log").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude (for advanced users).
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_rename_template() -> String {
    DEFAULT_RENAME_TEMPLATE.to_string()
}

fn default_start_number() -> u64 {
    1
}

impl TidyConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidytreerc.toml` in the current directory
    /// 3. Look for `~/.config/tidytree/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".tidytreerc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("tidytree")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the filter rules for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Compiled filter rules, ready for matching.
///
/// Glob and regex patterns are parsed once up front rather than per file.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Create compiled filters from filter rules.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Check if a file should be processed (not excluded).
    ///
    /// `file_path` is matched as given; callers pass it relative to the
    /// scanned root so patterns like `node_modules/**` work.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden/transient file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, file_path) {
            return true;
        }

        if !self.enable_hidden_files && is_hidden_or_transient(&file_name) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches_any(&self, patterns: &[Pattern], file_path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(file_path))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

/// Dot-files and `~`-prefixed editor/office lock files.
pub fn is_hidden_or_transient(file_name: &str) -> bool {
    file_name.starts_with('.') || file_name.starts_with('~')
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}
