//! Error types shared by every tree-wide operation.
//!
//! Only preconditions that make a whole run meaningless are errors. Anything
//! scoped to a single file or directory is a value carried in the operation's
//! report instead (see [`SkipReason`](crate::organizer::SkipReason)).

use std::path::PathBuf;

/// Errors that abort an operation before (or instead of) touching any file.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// The source or destination path is missing or is not a directory.
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    /// The pre-run backup copy could not be completed. Nothing was moved.
    #[error("Backup to {} failed: {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another mutating operation is running against an overlapping tree.
    #[error("Another operation is already running on {}", path.display())]
    Busy { path: PathBuf },

    /// The rename template is unusable.
    #[error("Invalid rename template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The root of a walk could not be read at all.
    #[error("Could not walk {}: {reason}", path.display())]
    Walk { path: PathBuf, reason: String },
}

/// Result type for tree-wide operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Checks that `path` exists and is a directory.
pub(crate) fn require_dir(path: &std::path::Path) -> OrganizeResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(OrganizeError::DirectoryNotFound {
            path: path.to_path_buf(),
        })
    }
}
