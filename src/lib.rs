//! tidytree - sort, deduplicate and tidy directory trees
//!
//! The library scans a directory, sorts its files into folders by type,
//! modification month or size, finds duplicate files, removes empty
//! directories, and batch-renames files from a template. Every operation is
//! a blocking call on [`Organizer`] that reports progress through an
//! [`EventSink`] and returns an owned report; [`worker::spawn`] runs one on a
//! background thread.

pub mod bucket;
pub mod category;
pub mod cli;
pub mod collision;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod events;
pub mod guard;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod prune;
pub mod rename;
pub mod scan;
pub mod worker;

pub use category::CategoryTable;
pub use config::{CompiledFilters, ConfigError, TidyConfig};
pub use duplicates::{DuplicateGroup, DuplicateReport, DuplicateStrategy, find_duplicates};
pub use error::{OrganizeError, OrganizeResult};
pub use events::{Event, EventSink};
pub use guard::{CancelToken, TreeGuard};
pub use organizer::{FileOutcome, Mode, OperationStats, OrganizeOptions, Organizer, SkipReason};
pub use prune::PruneReport;
pub use rename::{RenameReport, RenameTemplate};
pub use scan::{FileDescriptor, ScanResult, ScanSummary, Scanner};
pub use worker::BackgroundTask;
