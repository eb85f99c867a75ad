//! Busy guard and cooperative cancellation.
//!
//! Only one mutating operation may run against a directory tree at a time.
//! [`TreeGuard`] records the roots currently being worked on in a
//! process-wide registry and refuses any root that overlaps one of them
//! (same directory, an ancestor, or a descendant). The registration is
//! released when the guard is dropped.

use crate::error::{OrganizeError, OrganizeResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

static ACTIVE_ROOTS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Holds one or more tree roots for the lifetime of an operation.
#[derive(Debug)]
pub struct TreeGuard {
    roots: Vec<PathBuf>,
}

impl TreeGuard {
    /// Claims a single tree.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::Busy` if an overlapping tree is held.
    pub fn acquire(root: &Path) -> OrganizeResult<Self> {
        Self::acquire_all(std::iter::once(root))
    }

    /// Claims several trees at once; either all are claimed or none.
    ///
    /// Roots nested inside other requested roots are folded into their
    /// ancestor.
    pub fn acquire_all<'a, I>(roots: I) -> OrganizeResult<Self>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut wanted: Vec<PathBuf> = roots.into_iter().map(canonical).collect();
        wanted.sort();
        wanted.dedup();
        let mut minimal: Vec<PathBuf> = Vec::with_capacity(wanted.len());
        for root in wanted {
            // Sorted order puts ancestors first
            if !minimal.iter().any(|kept| root.starts_with(kept)) {
                minimal.push(root);
            }
        }

        let mut active = ACTIVE_ROOTS.lock().unwrap_or_else(PoisonError::into_inner);
        for root in &minimal {
            if let Some(held) = active
                .iter()
                .find(|held| root.starts_with(held) || held.starts_with(root))
            {
                tracing::warn!(requested = %root.display(), held = %held.display(), "tree is busy");
                return Err(OrganizeError::Busy { path: root.clone() });
            }
        }
        active.extend(minimal.iter().cloned());

        Ok(Self { roots: minimal })
    }

    /// The roots held by this guard.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Drop for TreeGuard {
    fn drop(&mut self) {
        let mut active = ACTIVE_ROOTS.lock().unwrap_or_else(PoisonError::into_inner);
        for root in &self.roots {
            active.remove(root);
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// A shared flag checked between file operations.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. In-flight file operations still finish.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
