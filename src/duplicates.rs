//! Duplicate detection over a scanned file list.

use crate::error::OrganizeResult;
use crate::events::{Event, EventSink};
use crate::guard::CancelToken;
use crate::organizer::Organizer;
use crate::scan::FileDescriptor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const HASH_CHUNK_SIZE: usize = 4096;

/// What makes two files "the same".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Same file name (case-insensitive) and same size. Reads no content.
    #[default]
    NameSize,
    /// Same SHA-256 digest of the contents.
    Content,
}

/// A canonical file and the files equivalent to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// The first file seen with this key.
    pub canonical: PathBuf,
    pub duplicates: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Files in the group, canonical included.
    pub fn file_count(&self) -> usize {
        self.duplicates.len() + 1
    }
}

/// Groups found plus the files that could not be examined.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub strategy: DuplicateStrategy,
    pub groups: Vec<DuplicateGroup>,
    pub failures: Vec<(PathBuf, String)>,
    /// Files examined (including failures).
    pub examined: usize,
    pub cancelled: bool,
}

impl DuplicateReport {
    /// Number of redundant copies across all groups.
    pub fn redundant_files(&self) -> usize {
        self.groups.iter().map(|g| g.duplicates.len()).sum()
    }

    /// Bytes that removing every redundant copy would free.
    pub fn reclaimable_bytes(&self, files: &[FileDescriptor]) -> u64 {
        let sizes: HashMap<&Path, u64> = files
            .iter()
            .map(|f| (f.path.as_path(), f.size_bytes))
            .collect();
        self.groups
            .iter()
            .flat_map(|g| &g.duplicates)
            .filter_map(|p| sizes.get(p.as_path()))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DuplicateKey {
    NameSize(String, u64),
    Digest(String),
}

/// Groups `files` by `strategy`.
///
/// Groups come out in the order their canonical file appears in `files`, and
/// members in the order they appear. Only keys shared by two or more files
/// form a group.
pub fn find_duplicates(
    files: &[FileDescriptor],
    strategy: DuplicateStrategy,
    sink: &EventSink,
    cancel: &CancelToken,
) -> DuplicateReport {
    let mut report = DuplicateReport {
        strategy,
        ..DuplicateReport::default()
    };
    // key -> index into `buckets`
    let mut index: HashMap<DuplicateKey, usize> = HashMap::new();
    let mut buckets: Vec<Vec<&Path>> = Vec::new();

    for file in files {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        report.examined += 1;

        let key = match strategy {
            DuplicateStrategy::NameSize => {
                DuplicateKey::NameSize(file.name.to_lowercase(), file.size_bytes)
            }
            DuplicateStrategy::Content => match hash_file(&file.path) {
                Ok(digest) => DuplicateKey::Digest(digest),
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "could not hash file");
                    sink.emit(Event::HashFailed {
                        path: file.path.clone(),
                        reason: e.to_string(),
                    });
                    report.failures.push((file.path.clone(), e.to_string()));
                    continue;
                }
            },
        };

        match index.get(&key) {
            Some(&slot) => buckets[slot].push(&file.path),
            None => {
                index.insert(key, buckets.len());
                buckets.push(vec![&file.path]);
            }
        }
    }

    for bucket in buckets.into_iter().filter(|b| b.len() > 1) {
        let group = DuplicateGroup {
            canonical: bucket[0].to_path_buf(),
            duplicates: bucket[1..].iter().map(|p| p.to_path_buf()).collect(),
        };
        sink.emit(Event::DuplicateGroup {
            canonical: group.canonical.clone(),
            duplicates: group.duplicates.clone(),
        });
        report.groups.push(group);
    }

    tracing::info!(
        strategy = ?strategy,
        examined = report.examined,
        groups = report.groups.len(),
        failures = report.failures.len(),
        "duplicate search finished"
    );
    report
}

/// Hex SHA-256 of a file's contents.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl Organizer {
    /// Scans `dir` and groups its files by `strategy`.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::DirectoryNotFound` if `dir` is not a directory.
    pub fn find_duplicates_in(
        &self,
        dir: &Path,
        strategy: DuplicateStrategy,
    ) -> OrganizeResult<DuplicateReport> {
        let scan = self.scan(dir)?;
        let mut report = find_duplicates(&scan.files, strategy, &self.sink, &self.cancel);
        report.failures.extend(scan.errors);
        Ok(report)
    }
}
