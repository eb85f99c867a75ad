//! Template-driven batch renaming.
//!
//! A template is plain text with these placeholders:
//!
//! | token        | replaced by                                      |
//! |--------------|--------------------------------------------------|
//! | `{num}`      | the counter                                      |
//! | `{num:03d}`  | the counter, zero-padded to 3 digits (any width) |
//! | `{name}`     | the original file stem                           |
//! | `{ext}`      | the original extension with its dot, or nothing  |
//!
//! Templates are checked before any file is touched.

use crate::collision::path_taken;
use crate::error::{OrganizeError, OrganizeResult};
use crate::events::Event;
use crate::guard::TreeGuard;
use crate::organizer::{Organizer, move_file};
use crate::scan::FileDescriptor;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static TOKEN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}"));
static NUM_FORMAT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^num:0?([0-9]{1,2})d$"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Number { width: usize },
    Stem,
    Extension,
}

/// A parsed rename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl RenameTemplate {
    /// Parses `template`.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::InvalidTemplate` for an empty template, an
    /// unknown `{...}` token, a stray brace, or a path separator.
    pub fn parse(template: &str) -> OrganizeResult<Self> {
        let invalid = |reason: &str| OrganizeError::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };
        if template.is_empty() {
            return Err(invalid("template is empty"));
        }
        if template.contains(['/', '\\']) {
            return Err(invalid("template must not contain a path separator"));
        }

        let token = regex_or_invalid(&TOKEN, template)?;
        let num_format = regex_or_invalid(&NUM_FORMAT, template)?;

        let mut segments = Vec::new();
        let mut cursor = 0;
        for caps in token.captures_iter(template) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            push_literal(&mut segments, &template[cursor..whole.start()], &invalid)?;
            cursor = whole.end();

            let segment = match inner.as_str() {
                "num" => Segment::Number { width: 0 },
                "name" => Segment::Stem,
                "ext" => Segment::Extension,
                other => match num_format.captures(other).and_then(|c| c.get(1)) {
                    Some(width) => Segment::Number {
                        width: width.as_str().parse().unwrap_or(0),
                    },
                    None => return Err(invalid(&format!("unknown placeholder '{{{other}}}'"))),
                },
            };
            segments.push(segment);
        }
        push_literal(&mut segments, &template[cursor..], &invalid)?;

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Builds the new file name for `path` with counter value `number`.
    ///
    /// `{name}` and `{ext}` copy the original bytes, valid UTF-8 or not.
    pub fn render(&self, path: &Path, number: u64) -> OsString {
        let mut out = OsString::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push(text),
                Segment::Number { width } => out.push(format!("{number:0width$}")),
                Segment::Stem => {
                    if let Some(stem) = path.file_stem() {
                        out.push(stem);
                    }
                }
                Segment::Extension => {
                    if let Some(ext) = path.extension() {
                        out.push(".");
                        out.push(ext);
                    }
                }
            }
        }
        out
    }
}

fn regex_or_invalid<'a>(
    regex: &'a LazyLock<Result<Regex, regex::Error>>,
    template: &str,
) -> OrganizeResult<&'a Regex> {
    regex
        .as_ref()
        .map_err(|e| OrganizeError::InvalidTemplate {
            template: template.to_string(),
            reason: e.to_string(),
        })
}

fn push_literal(
    segments: &mut Vec<Segment>,
    text: &str,
    invalid: &impl Fn(&str) -> OrganizeError,
) -> OrganizeResult<()> {
    if text.contains(['{', '}']) {
        return Err(invalid("unbalanced brace"));
    }
    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }
    Ok(())
}

/// One performed (or planned) rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRecord {
    pub from: PathBuf,
    pub to: PathBuf,
}

/// Outcome of a batch rename.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    pub renamed: Vec<RenameRecord>,
    /// Files whose new name equals the old one.
    pub unchanged: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl RenameReport {
    pub fn attempted(&self) -> usize {
        self.renamed.len() + self.unchanged.len() + self.failures.len()
    }
}

impl Organizer {
    /// Renames `files` in order, each within its own directory.
    ///
    /// The list is usually a scan result, so nested files are renamed too.
    /// The counter starts at `start_number` and advances once per file,
    /// failed ones included. A target that already exists is a per-file
    /// failure; nothing is ever overwritten.
    ///
    /// # Errors
    ///
    /// * `InvalidTemplate` before any file is touched
    /// * `Busy` (not in a dry run) if a parent directory overlaps a tree in use
    pub fn rename(
        &self,
        files: &[FileDescriptor],
        template: &str,
        start_number: u64,
        dry_run: bool,
    ) -> OrganizeResult<RenameReport> {
        let template = RenameTemplate::parse(template)?;

        let _guard = if dry_run {
            None
        } else {
            let parents: Vec<&Path> = files
                .iter()
                .filter_map(|f| f.path.parent())
                .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
                .collect();
            Some(TreeGuard::acquire_all(parents)?)
        };

        let mut report = RenameReport {
            dry_run,
            ..RenameReport::default()
        };
        if let Some(first) = files.first() {
            self.sink.emit(Event::RunStarted {
                root: first.path.parent().map(Path::to_path_buf).unwrap_or_default(),
                total: files.len(),
            });
        }
        let mut planned: HashSet<PathBuf> = HashSet::new();
        let mut vacated: HashSet<PathBuf> = HashSet::new();

        for (index, descriptor) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.sink.emit(Event::Cancelled {
                    remaining: files.len() - index,
                });
                report.cancelled = true;
                break;
            }

            let file = &descriptor.path;
            let number = start_number.saturating_add(index as u64);
            let new_name = template.render(file, number);
            let target = file.with_file_name(&new_name);

            if target == *file {
                report.unchanged.push(file.clone());
                continue;
            }

            let outcome = if !path_taken(file) {
                Err("file no longer exists".to_string())
            } else if (path_taken(&target) && !vacated.contains(&target))
                || planned.contains(&target)
            {
                Err(format!("{} already exists", new_name.to_string_lossy()))
            } else if dry_run {
                Ok(())
            } else {
                move_file(file, &target).map_err(|e| e.to_string())
            };

            match outcome {
                Ok(()) => {
                    self.sink.emit(Event::Renamed {
                        from: file.clone(),
                        to: target.clone(),
                        dry_run,
                    });
                    if dry_run {
                        vacated.insert(file.clone());
                        planned.insert(target.clone());
                    }
                    report.renamed.push(RenameRecord {
                        from: file.clone(),
                        to: target,
                    });
                }
                Err(reason) => {
                    tracing::warn!(path = %file.display(), %reason, "rename failed");
                    self.sink.emit(Event::RenameFailed {
                        path: file.clone(),
                        reason: reason.clone(),
                    });
                    report.failures.push((file.clone(), reason));
                }
            }
        }

        tracing::info!(
            template = template.as_str(),
            renamed = report.renamed.len(),
            unchanged = report.unchanged.len(),
            failures = report.failures.len(),
            dry_run,
            "rename finished"
        );
        Ok(report)
    }

    /// Scans `dir` recursively and renames every file found, in scan order.
    ///
    /// One counter runs across the whole tree; each file keeps its folder.
    pub fn rename_in(
        &self,
        dir: &Path,
        template: &str,
        start_number: u64,
        dry_run: bool,
    ) -> OrganizeResult<RenameReport> {
        RenameTemplate::parse(template)?;
        let scan = self.scan(dir)?;
        self.rename(&scan.files, template, start_number, dry_run)
    }
}
