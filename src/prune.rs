//! Empty-directory cleanup.

use crate::error::{OrganizeError, OrganizeResult, require_dir};
use crate::events::{Event, EventSink};
use crate::guard::TreeGuard;
use crate::organizer::Organizer;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a prune pass found and did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    /// Empty directories, deepest first.
    pub empty_dirs: Vec<PathBuf>,
    /// Directories actually removed. Always empty in preview mode.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
    pub preview_only: bool,
    pub cancelled: bool,
}

impl Organizer {
    /// Finds (and unless `preview_only`, removes) empty directories below
    /// `root`. `root` itself is never removed.
    ///
    /// A directory counts as empty when everything in it is a directory that
    /// was itself found empty in this pass, so a chain like `a/b/c` goes in
    /// one call.
    ///
    /// # Errors
    ///
    /// * `DirectoryNotFound` if `root` is not a directory
    /// * `Busy` in delete mode when an overlapping tree is being worked on
    /// * `Walk` if `root` cannot be read
    pub fn prune(&self, root: &Path, preview_only: bool) -> OrganizeResult<PruneReport> {
        self.prune_with(root, preview_only, |dir| fs::remove_dir(dir))
    }

    fn prune_with<R>(
        &self,
        root: &Path,
        preview_only: bool,
        remove: R,
    ) -> OrganizeResult<PruneReport>
    where
        R: Fn(&Path) -> io::Result<()>,
    {
        require_dir(root)?;
        let _guard = if preview_only {
            None
        } else {
            Some(TreeGuard::acquire(root)?)
        };

        let mut report = PruneReport {
            preview_only,
            ..PruneReport::default()
        };
        // Directories that are gone (delete mode) or would be (preview)
        let mut cleared: HashSet<PathBuf> = HashSet::new();

        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

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
                    record_failure(&mut report, &self.sink, path, e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            match is_effectively_empty(path, &cleared) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    record_failure(&mut report, &self.sink, path.to_path_buf(), e.to_string());
                    continue;
                }
            }

            report.empty_dirs.push(path.to_path_buf());
            self.sink.emit(Event::EmptyDir {
                path: path.to_path_buf(),
            });

            if preview_only {
                cleared.insert(path.to_path_buf());
                continue;
            }
            match remove(path) {
                Ok(()) => {
                    cleared.insert(path.to_path_buf());
                    report.removed.push(path.to_path_buf());
                    self.sink.emit(Event::DirRemoved {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not remove directory");
                    self.sink.emit(Event::DirRemoveFailed {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                    report.failures.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            empty = report.empty_dirs.len(),
            removed = report.removed.len(),
            failures = report.failures.len(),
            preview_only,
            "prune finished"
        );
        Ok(report)
    }
}

/// True when every entry of `dir` is a directory already in `cleared`.
fn is_effectively_empty(dir: &Path, cleared: &HashSet<PathBuf>) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() || !cleared.contains(&entry.path()) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn record_failure(report: &mut PruneReport, sink: &EventSink, path: PathBuf, reason: String) {
    if report.failures.last().is_some_and(|(last, _)| *last == path) {
        return;
    }
    tracing::warn!(path = %path.display(), %reason, "could not inspect directory");
    sink.emit(Event::ScanError {
        path: path.clone(),
        reason: reason.clone(),
    });
    report.failures.push((path, reason));
}
