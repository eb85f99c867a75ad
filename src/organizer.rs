//! The relocation engine: sorting files into label folders.
//!
//! An organize run optionally copies the source tree to a backup sibling,
//! scans it, works out a label folder for every file (by category, month or
//! size), picks a name there that does not collide with anything, and moves
//! the file. A dry run does everything except touch the filesystem.
//!
//! Each file is handled on its own. A file that cannot be moved is left where
//! it was, counted as skipped with its reason, and the run carries on.

use crate::bucket::{date_bucket, size_bucket};
use crate::category::CategoryTable;
use crate::collision::{path_taken, resolve, resolve_with};
use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult, require_dir};
use crate::events::{Event, EventSink};
use crate::guard::{CancelToken, TreeGuard};
use crate::scan::{
    CategoryTally, FileDescriptor, ScanOptions, ScanResult, ScanSummary, Scanner, summarize,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How files are grouped into folders.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// By extension category (images, documents, ...).
    #[default]
    Type,
    /// By modification month, `YYYY-MM` in UTC.
    Date,
    /// By size bucket.
    Size,
}

/// Options for a single organize run.
#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    pub mode: Mode,
    /// Plan only; no file or directory is created, moved or copied.
    pub dry_run: bool,
    /// Copy the whole source tree to a `backup_<timestamp>` sibling first.
    pub backup: bool,
    /// Root for the label folders. Defaults to the source directory.
    pub destination: Option<PathBuf>,
}

/// Why a file was left where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("already organized")]
    AlreadyInPlace,
    #[error("file no longer exists")]
    Vanished,
    #[error("could not create {}: {reason}", dir.display())]
    CreateDir { dir: PathBuf, reason: String },
    #[error("move failed: {reason}")]
    MoveFailed { reason: String },
    #[error("cancelled before it was processed")]
    Cancelled,
}

/// Result of handling one file: where it went (or would go), or why not.
pub type FileOutcome = Result<PathBuf, SkipReason>;

/// One performed (or, in a dry run, planned) move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub from: PathBuf,
    pub to: PathBuf,
    pub label: String,
}

/// One file that was not moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Counters and records for one organize run.
///
/// `total == moved + skipped` holds for every run. In a dry run `moved`
/// counts planned moves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationStats {
    pub total: usize,
    pub moved: usize,
    pub skipped: usize,
    /// Files and bytes moved into each label folder.
    pub categories: BTreeMap<String, CategoryTally>,
    pub moves: Vec<MoveRecord>,
    pub skipped_files: Vec<SkippedFile>,
    /// Entries the scan could not read; they were never counted as files.
    pub scan_errors: Vec<(PathBuf, String)>,
    pub dry_run: bool,
    pub cancelled: bool,
    pub backup: Option<PathBuf>,
}

impl OperationStats {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    fn record(&mut self, file: &FileDescriptor, label: String, outcome: FileOutcome) {
        self.total += 1;
        match outcome {
            Ok(to) => {
                self.moved += 1;
                self.categories
                    .entry(label.clone())
                    .or_default()
                    .add(file.size_bytes);
                self.moves.push(MoveRecord {
                    from: file.path.clone(),
                    to,
                    label,
                });
            }
            Err(reason) => self.record_skip(file, reason),
        }
    }

    fn record_skip(&mut self, file: &FileDescriptor, reason: SkipReason) {
        self.skipped += 1;
        self.skipped_files.push(SkippedFile {
            path: file.path.clone(),
            reason,
        });
    }

    /// True when no file was skipped for a reason other than being in place.
    pub fn is_clean(&self) -> bool {
        self.skipped_files
            .iter()
            .all(|s| s.reason == SkipReason::AlreadyInPlace)
    }
}

/// Entry point for every operation on a tree.
///
/// Holds the injected category table, the scan filters, the event sink and
/// the cancellation token. Methods block until the operation finishes; wrap
/// them in [`crate::worker::spawn`] to run them in the background.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tidytree::{CategoryTable, Mode, OrganizeOptions, Organizer};
///
/// let organizer = Organizer::new(CategoryTable::default());
/// let options = OrganizeOptions { mode: Mode::Type, ..Default::default() };
/// let stats = organizer.organize(Path::new("/home/me/Downloads"), &options)?;
/// println!("moved {} of {}", stats.moved, stats.total);
/// # Ok::<(), tidytree::OrganizeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Organizer {
    table: CategoryTable,
    filters: CompiledFilters,
    pub(crate) sink: EventSink,
    pub(crate) cancel: CancelToken,
}

impl Organizer {
    /// Creates an organizer with default filters and no event consumer.
    pub fn new(table: CategoryTable) -> Self {
        Self {
            table,
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: CompiledFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// Scans `root` with this organizer's filters.
    pub fn scan(&self, root: &Path) -> OrganizeResult<ScanResult> {
        let options = ScanOptions {
            filters: self.filters.clone(),
            ..ScanOptions::default()
        };
        Scanner::new(&options, &self.sink).scan(root)
    }

    /// Scans `root` and tallies its files by category.
    pub fn summarize(&self, root: &Path) -> OrganizeResult<ScanSummary> {
        let scan = self.scan(root)?;
        Ok(summarize(&scan.files, &self.table))
    }

    /// The folder name a file belongs in under `mode`.
    pub fn label_for(&self, file: &FileDescriptor, mode: Mode) -> String {
        match mode {
            Mode::Type => self.table.category(&file.extension).to_string(),
            Mode::Date => date_bucket(file.modified_at),
            Mode::Size => size_bucket(file.size_bytes).to_string(),
        }
    }

    /// Sorts every file under `source` into label folders.
    ///
    /// # Errors
    ///
    /// * `DirectoryNotFound` if the source or destination is not a directory
    /// * `Busy` if another mutating operation holds an overlapping tree
    /// * `BackupFailed` if the backup copy could not be completed; no file
    ///   has been moved in that case
    ///
    /// Per-file problems are never errors; they show up in
    /// `OperationStats::skipped_files`.
    pub fn organize(
        &self,
        source: &Path,
        options: &OrganizeOptions,
    ) -> OrganizeResult<OperationStats> {
        require_dir(source)?;
        let dest = options.destination.as_deref().unwrap_or(source);
        require_dir(dest)?;
        let source = canonical(source);
        let dest = canonical(dest);

        let _guard = if options.dry_run {
            None
        } else {
            Some(TreeGuard::acquire_all([source.as_path(), dest.as_path()])?)
        };

        tracing::info!(
            source = %source.display(),
            dest = %dest.display(),
            mode = ?options.mode,
            dry_run = options.dry_run,
            backup = options.backup,
            "organize started"
        );
        let mut stats = OperationStats::new(options.dry_run);

        if options.backup {
            let backup = backup_path_for(&source)?;
            self.sink.emit(Event::Backup {
                path: backup.clone(),
                dry_run: options.dry_run,
            });
            if !options.dry_run {
                create_backup(&source, &backup)?;
                stats.backup = Some(backup);
            }
        }

        let skip_subtree = (dest != source && dest.starts_with(&source)).then(|| dest.clone());
        let scan_options = ScanOptions {
            filters: self.filters.clone(),
            skip_subtree,
        };
        let scan = Scanner::new(&scan_options, &self.sink).scan(&source)?;
        stats.scan_errors = scan.errors;

        self.sink.emit(Event::RunStarted {
            root: source.clone(),
            total: scan.files.len(),
        });

        let mut planned: HashSet<PathBuf> = HashSet::new();
        for (index, file) in scan.files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = &scan.files[index..];
                self.sink.emit(Event::Cancelled {
                    remaining: remaining.len(),
                });
                for file in remaining {
                    stats.total += 1;
                    stats.record_skip(file, SkipReason::Cancelled);
                }
                stats.cancelled = true;
                break;
            }

            let label = self.label_for(file, options.mode);
            let target_dir = dest.join(&label);
            let outcome = if options.dry_run {
                plan_file(file, &target_dir, &mut planned)
            } else {
                relocate_file(file, &target_dir)
            };

            match &outcome {
                Ok(to) if options.dry_run => self.sink.emit(Event::Planned {
                    from: file.path.clone(),
                    to: to.clone(),
                    label: label.clone(),
                }),
                Ok(to) => self.sink.emit(Event::Moved {
                    from: file.path.clone(),
                    to: to.clone(),
                    label: label.clone(),
                }),
                Err(reason) => {
                    if *reason != SkipReason::AlreadyInPlace {
                        tracing::warn!(path = %file.path.display(), %reason, "file skipped");
                    }
                    self.sink.emit(Event::Skipped {
                        path: file.path.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
            stats.record(file, label, outcome);
        }

        tracing::info!(
            total = stats.total,
            moved = stats.moved,
            skipped = stats.skipped,
            cancelled = stats.cancelled,
            "organize finished"
        );
        Ok(stats)
    }
}

/// Works out the target a dry run would use, reserving it in `planned`.
fn plan_file(
    file: &FileDescriptor,
    target_dir: &Path,
    planned: &mut HashSet<PathBuf>,
) -> FileOutcome {
    if file.path.parent() == Some(target_dir) {
        return Err(SkipReason::AlreadyInPlace);
    }
    let target = resolve_with(target_dir, file.file_name(), |p| {
        path_taken(p) || planned.contains(p)
    });
    planned.insert(target.clone());
    Ok(target)
}

/// Moves one file into `target_dir` under a free name.
fn relocate_file(file: &FileDescriptor, target_dir: &Path) -> FileOutcome {
    if file.path.parent() == Some(target_dir) {
        return Err(SkipReason::AlreadyInPlace);
    }

    if !path_taken(&file.path) {
        return Err(SkipReason::Vanished);
    }

    fs::create_dir_all(target_dir).map_err(|e| SkipReason::CreateDir {
        dir: target_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let target = resolve(target_dir, file.file_name());
    move_file(&file.path, &target).map_err(|e| SkipReason::MoveFailed {
        reason: e.to_string(),
    })?;
    Ok(target)
}

/// Moves `src` to `dst` without ever replacing an existing `dst`.
///
/// A plain rename is used where possible. Across filesystems the file is
/// copied into a freshly created `dst` and the source removed afterwards; if
/// any step fails the partial copy is deleted and `src` is left untouched.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if path_taken(dst) {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dst.display()),
        ));
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(src = %src.display(), "rename crosses devices, copying");
            copy_then_remove(src, dst)
        }
        Err(e) => Err(e),
    }
}

fn copy_then_remove(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(dst)?;

    if let Err(e) = copy_contents(&mut reader, &mut writer).and_then(|()| fs::remove_file(src)) {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(dst) {
            tracing::warn!(path = %dst.display(), error = %cleanup, "could not remove partial copy");
        }
        return Err(e);
    }
    Ok(())
}

fn copy_contents(reader: &mut File, writer: &mut File) -> io::Result<()> {
    let metadata = reader.metadata()?;
    io::copy(reader, writer)?;
    writer.set_permissions(metadata.permissions())?;
    writer.set_modified(metadata.modified()?)?;
    writer.sync_all()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Picks `backup_<YYYYmmdd_HHMMSS>` next to `source`, adding `-N` if taken.
fn backup_path_for(source: &Path) -> OrganizeResult<PathBuf> {
    let parent = source.parent().ok_or_else(|| OrganizeError::BackupFailed {
        path: source.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            "source directory has no parent to hold a backup",
        ),
    })?;

    let base = format!("backup_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let mut candidate = parent.join(&base);
    let mut counter = 1;
    while path_taken(&candidate) {
        candidate = parent.join(format!("{base}-{counter}"));
        counter += 1;
    }
    Ok(candidate)
}

/// Copies the whole tree under `source` into the new directory `backup`.
///
/// On failure whatever was copied is removed again.
fn create_backup(source: &Path, backup: &Path) -> OrganizeResult<()> {
    tracing::info!(source = %source.display(), backup = %backup.display(), "creating backup");
    fs::create_dir(backup).map_err(|e| OrganizeError::BackupFailed {
        path: backup.to_path_buf(),
        source: e,
    })?;
    copy_tree(source, backup).map_err(|e| {
        if let Err(cleanup) = fs::remove_dir_all(backup) {
            tracing::warn!(path = %backup.display(), error = %cleanup, "could not remove partial backup");
        }
        OrganizeError::BackupFailed {
            path: backup.to_path_buf(),
            source: e,
        }
    })
}

fn copy_tree(source: &Path, backup: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry.path().strip_prefix(source).map_err(io::Error::other)?;
        let target = backup.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            // Sockets, pipes and devices have no contents worth keeping.
            tracing::warn!(path = %entry.path().display(), "skipping special file in backup");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}
