//! Progress events emitted by core operations.
//!
//! Events travel over a bounded channel. Sending never blocks: when the
//! receiver is slow or gone, events are dropped. Each event has a
//! human-readable `Display` form for log views.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A run over `total` files is starting.
    RunStarted { root: PathBuf, total: usize },
    /// A backup copy is being (or, in a dry run, would be) created.
    Backup { path: PathBuf, dry_run: bool },
    /// A file was moved.
    Moved {
        from: PathBuf,
        to: PathBuf,
        label: String,
    },
    /// A dry run would move a file.
    Planned {
        from: PathBuf,
        to: PathBuf,
        label: String,
    },
    /// A file was left where it was.
    Skipped { path: PathBuf, reason: String },
    /// An entry could not be read during a walk.
    ScanError { path: PathBuf, reason: String },
    /// A file could not be hashed.
    HashFailed { path: PathBuf, reason: String },
    /// A group of equivalent files was found.
    DuplicateGroup {
        canonical: PathBuf,
        duplicates: Vec<PathBuf>,
    },
    /// An empty directory was found.
    EmptyDir { path: PathBuf },
    /// An empty directory was removed.
    DirRemoved { path: PathBuf },
    /// An empty directory could not be removed.
    DirRemoveFailed { path: PathBuf, reason: String },
    /// A file was (or, in a dry run, would be) renamed.
    Renamed {
        from: PathBuf,
        to: PathBuf,
        dry_run: bool,
    },
    /// A file could not be renamed.
    RenameFailed { path: PathBuf, reason: String },
    /// Cancellation was observed; remaining work is skipped.
    Cancelled { remaining: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { root, total } => {
                write!(f, "Processing {} file(s) in {}", total, root.display())
            }
            Self::Backup { path, dry_run: true } => {
                write!(f, "Would create backup at {}", path.display())
            }
            Self::Backup { path, dry_run: false } => {
                write!(f, "Creating backup at {}", path.display())
            }
            Self::Moved { from, to, label } => {
                write!(f, "Moved {} -> {}/ ({})", from.display(), label, to.display())
            }
            Self::Planned { from, to, label } => write!(
                f,
                "Would move {} -> {}/ ({})",
                from.display(),
                label,
                to.display()
            ),
            Self::Skipped { path, reason } => {
                write!(f, "Skipped {}: {}", path.display(), reason)
            }
            Self::ScanError { path, reason } => {
                write!(f, "Could not read {}: {}", path.display(), reason)
            }
            Self::HashFailed { path, reason } => {
                write!(f, "Could not hash {}: {}", path.display(), reason)
            }
            Self::DuplicateGroup {
                canonical,
                duplicates,
            } => write!(
                f,
                "{} has {} duplicate(s)",
                canonical.display(),
                duplicates.len()
            ),
            Self::EmptyDir { path } => write!(f, "Empty directory: {}", path.display()),
            Self::DirRemoved { path } => write!(f, "Removed {}", path.display()),
            Self::DirRemoveFailed { path, reason } => {
                write!(f, "Could not remove {}: {}", path.display(), reason)
            }
            Self::Renamed { from, to, dry_run } => write!(
                f,
                "{} {} -> {}",
                if *dry_run { "Would rename" } else { "Renamed" },
                from.display(),
                to.display()
            ),
            Self::RenameFailed { path, reason } => {
                write!(f, "Could not rename {}: {}", path.display(), reason)
            }
            Self::Cancelled { remaining } => {
                write!(f, "Cancelled, {} file(s) left untouched", remaining)
            }
        }
    }
}

/// The sending half handed to core operations.
///
/// Cloning is cheap. A sink created with [`EventSink::discard`] swallows
/// everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<SyncSender<Event>>,
}

impl EventSink {
    /// Creates a sink and its receiver with room for `capacity` pending events.
    pub fn channel(capacity: usize) -> (Self, Receiver<Event>) {
        let (sender, receiver) = std::sync::mpsc::sync_channel(capacity.max(1));
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A sink that drops every event.
    pub fn discard() -> Self {
        Self { sender: None }
    }

    /// Delivers an event if there is room, otherwise drops it.
    pub fn emit(&self, event: Event) {
        tracing::debug!(%event);
        if let Some(sender) = &self.sender {
            match sender.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(dropped)) => {
                    tracing::trace!(event = %dropped, "event queue full, dropping");
                }
            }
        }
    }
}
