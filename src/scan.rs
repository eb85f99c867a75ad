//! Directory scanning.
//!
//! A scan walks a tree once and produces a flat, ordered list of
//! [`FileDescriptor`]s. Every other operation works from such a list.

use crate::category::{CategoryTable, normalize_extension};
use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult, require_dir};
use crate::events::{Event, EventSink};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One regular file found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    /// Full path to the file.
    pub path: PathBuf,
    /// File name including extension, lossily decoded for display.
    pub name: String,
    /// Lower-cased extension with leading dot, or empty.
    pub extension: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

impl FileDescriptor {
    /// Reads the descriptor for a single path.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata))
    }

    /// The file name exactly as stored on disk.
    pub fn file_name(&self) -> &OsStr {
        self.path
            .file_name()
            .unwrap_or_else(|| OsStr::new(&self.name))
    }

    fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()))
            .unwrap_or_default();
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Self {
            path: path.to_path_buf(),
            name,
            extension,
            size_bytes: metadata.len(),
            modified_at,
        }
    }
}

/// What a scan should skip.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Hidden/transient and user-configured exclusions.
    pub filters: CompiledFilters,
    /// A subtree that is never entered (e.g. a destination inside the source).
    pub skip_subtree: Option<PathBuf>,
}

/// The outcome of a scan: the files found and the entries that failed.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<FileDescriptor>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Walks a directory tree into [`FileDescriptor`]s.
pub struct Scanner<'a> {
    options: &'a ScanOptions,
    sink: &'a EventSink,
}

impl<'a> Scanner<'a> {
    pub fn new(options: &'a ScanOptions, sink: &'a EventSink) -> Self {
        Self { options, sink }
    }

    /// Scans `root` recursively.
    ///
    /// Entries are visited in file-name order within each directory so that
    /// repeated scans of an unchanged tree produce identical lists.
    /// Symlinks are not followed.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::DirectoryNotFound` if `root` is not a
    /// directory. Unreadable entries below the root are collected in
    /// `ScanResult::errors` instead.
    pub fn scan(&self, root: &Path) -> OrganizeResult<ScanResult> {
        require_dir(root)?;
        let mut result = ScanResult::default();
        let skip = self.options.skip_subtree.as_deref();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| skip.is_none_or(|skip| entry.path() != skip));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    if path == root {
                        return Err(OrganizeError::Walk {
                            path,
                            reason: e.to_string(),
                        });
                    }
                    self.record_error(&mut result, path, e.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !self.options.filters.should_include(relative) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => result
                    .files
                    .push(FileDescriptor::from_metadata(entry.path(), &metadata)),
                Err(e) => self.record_error(&mut result, entry.path().to_path_buf(), e.to_string()),
            }
        }

        tracing::info!(
            root = %root.display(),
            files = result.files.len(),
            errors = result.errors.len(),
            "scan complete"
        );
        Ok(result)
    }

    fn record_error(&self, result: &mut ScanResult, path: PathBuf, reason: String) {
        tracing::warn!(path = %path.display(), %reason, "unreadable entry");
        self.sink.emit(Event::ScanError {
            path: path.clone(),
            reason: reason.clone(),
        });
        result.errors.push((path, reason));
    }
}

/// Per-category statistics for `files`.
pub fn summarize(files: &[FileDescriptor], table: &CategoryTable) -> ScanSummary {
    ScanSummary::from_files(files, table)
}

/// File count and byte total for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub files: usize,
    pub bytes: u64,
}

impl CategoryTally {
    pub fn add(&mut self, size_bytes: u64) {
        self.files += 1;
        self.bytes += size_bytes;
    }
}

/// Per-category statistics over a scanned file list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub total_files: usize,
    pub total_bytes: u64,
    pub categories: BTreeMap<String, CategoryTally>,
}

impl ScanSummary {
    /// Tallies `files` by category.
    pub fn from_files(files: &[FileDescriptor], table: &CategoryTable) -> Self {
        let mut summary = Self::default();
        for file in files {
            summary.total_files += 1;
            summary.total_bytes += file.size_bytes;
            summary
                .categories
                .entry(table.category(&file.extension).to_string())
                .or_default()
                .add(file.size_bytes);
        }
        summary
    }

    /// Categories ordered by file count, largest first, ties by name.
    pub fn by_count(&self) -> Vec<(&str, CategoryTally)> {
        let mut rows: Vec<_> = self
            .categories
            .iter()
            .map(|(name, tally)| (name.as_str(), *tally))
            .collect();
        rows.sort_by(|a, b| b.1.files.cmp(&a.1.files).then(a.0.cmp(b.0)));
        rows
    }

    /// Share of all files that fall in `category`, in percent.
    pub fn percentage(&self, category: &str) -> f64 {
        match self.categories.get(category) {
            Some(tally) if self.total_files > 0 => {
                tally.files as f64 * 100.0 / self.total_files as f64
            }
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExcludeRules, FilterRules};
    use tempfile::TempDir;

    fn scan(root: &Path, options: &ScanOptions) -> ScanResult {
        Scanner::new(options, &EventSink::discard())
            .scan(root)
            .expect("scan should succeed")
    }

    fn names(result: &ScanResult) -> Vec<&str> {
        result.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_scan_is_recursive_and_sorted() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("sub/c.txt"), "c").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), "d").unwrap();

        let result = scan(root, &ScanOptions::default());
        assert_eq!(names(&result), vec!["a.txt", "b.txt", "c.txt", "d.txt"]);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_scan_skips_hidden_and_transient_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join(".hidden"), "h").unwrap();
        fs::write(root.join("~$lock.docx"), "l").unwrap();
        fs::write(root.join("visible.txt"), "v").unwrap();

        let result = scan(root, &ScanOptions::default());
        assert_eq!(names(&result), vec!["visible.txt"]);
    }

    #[test]
    fn test_scan_descriptor_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("Photo.JPG");
        fs::write(&path, vec![0u8; 2000]).unwrap();

        let result = scan(temp_dir.path(), &ScanOptions::default());
        let file = &result.files[0];
        assert_eq!(file.path, path);
        assert_eq!(file.name, "Photo.JPG");
        assert_eq!(file.extension, ".jpg");
        assert_eq!(file.size_bytes, 2000);
    }

    #[test]
    fn test_scan_applies_relative_glob_filters() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join("main.js"), "x").unwrap();

        let rules = FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["node_modules/**".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let options = ScanOptions {
            filters: CompiledFilters::new(&rules).unwrap(),
            ..Default::default()
        };

        let result = scan(root, &options);
        assert_eq!(names(&result), vec!["main.js"]);
    }

    #[test]
    fn test_scan_skips_subtree() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir(root.join("sorted")).unwrap();
        fs::write(root.join("sorted/done.txt"), "x").unwrap();
        fs::write(root.join("todo.txt"), "x").unwrap();

        let options = ScanOptions {
            skip_subtree: Some(root.join("sorted")),
            ..Default::default()
        };
        let result = scan(root, &options);
        assert_eq!(names(&result), vec!["todo.txt"]);
    }

    #[test]
    fn test_scan_missing_root() {
        let options = ScanOptions::default();
        let sink = EventSink::discard();
        let result = Scanner::new(&options, &sink).scan(Path::new("/non/existent/path"));
        assert!(matches!(
            result,
            Err(OrganizeError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_summary_counts_and_bytes() {
        let now = Utc::now();
        let file = |name: &str, ext: &str, size: u64| FileDescriptor {
            path: PathBuf::from(name),
            name: name.to_string(),
            extension: ext.to_string(),
            size_bytes: size,
            modified_at: now,
        };
        let files = vec![
            file("a.jpg", ".jpg", 100),
            file("b.png", ".png", 50),
            file("c.pdf", ".pdf", 10),
            file("d", "", 1),
        ];

        let summary = summarize(&files, &CategoryTable::default());
        assert_eq!(summary.total_files, 4);
        assert_eq!(summary.total_bytes, 161);
        assert_eq!(
            summary.categories["images"],
            CategoryTally {
                files: 2,
                bytes: 150
            }
        );
        assert_eq!(summary.by_count()[0].0, "images");
        assert_eq!(summary.percentage("images"), 50.0);
        assert_eq!(summary.percentage("videos"), 0.0);
    }
}
