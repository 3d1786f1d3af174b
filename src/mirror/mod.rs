//! Mirror synchronization.
//!
//! A run moves through a fixed sequence of phases, stopping at the first
//! fatal error:
//!
//! 1. **Load**: verify the source/target binding, lock the target, load the
//!    hash cache (replaying any journal left by an earlier run).
//! 2. **Copy**: pre-order walk of the source; create mirror directories and
//!    copy every file whose size or modification time differs.
//! 3. **Prune**: drop cache records for files missing from the mirror.
//! 4. **Reconcile**: post-order walk of the mirror; remove directories and
//!    dispose of files that are no longer in the source, deleting those
//!    whose content still exists elsewhere in the mirror and archiving the
//!    rest.
//! 5. **Prune** again.
//! 6. **Compact** the hash cache.
//!
//! The result is a [`SyncSummary`] for the caller to print.

pub mod reconcile;
pub mod synchronizer;

use std::io;
use std::path::PathBuf;

use crate::cache::CacheError;
use crate::scanner::{CopyError, ScanError};
use crate::target::TargetError;

pub use reconcile::{find_duplicate, StaleDisposition};
pub use synchronizer::Synchronizer;

/// What to mirror where.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Source directory
    pub source: PathBuf,
    /// Target directory (holding `mirror/`, `archive/` and the cache)
    pub target: PathBuf,
    /// Exclusion globs, matched against paths relative to the source root
    pub exclude: Vec<String>,
}

impl SyncOptions {
    /// Options without exclusions.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            exclude: Vec::new(),
        }
    }

    /// Set the exclusion globs.
    #[must_use]
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Files present in the source, including ones skipped as unreadable
    pub files_up_to_date: usize,
    /// Directories present in the source
    pub dirs_up_to_date: usize,
    /// Files copied in this run
    pub files_updated: usize,
    /// Bytes copied in this run
    pub bytes_copied: u64,
    /// Stale files moved to the archive
    pub files_archived: usize,
    /// Bytes moved to the archive
    pub bytes_archived: u64,
    /// Stale files deleted because their content exists elsewhere in the mirror
    pub files_deduplicated: usize,
    /// Source files that could not be read
    pub files_skipped: usize,
    /// Stale directories removed from the mirror
    pub dirs_removed: usize,
    /// Cache records dropped because their file left the mirror
    pub records_pruned: usize,
}

/// Errors that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// Source/target validation, marker or lock failure.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Directory walk failure.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// File copy failure.
    #[error(transparent)]
    Copy(#[from] CopyError),

    /// Hash cache failure, including corruption.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A directory that should be empty still has entries.
    #[error("Refusing to remove non-empty directory: {0}")]
    DirectoryNotEmpty(PathBuf),

    /// Filesystem operation failure in the mirror or archive.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Ctrl+C was pressed.
    #[error("Synchronization interrupted")]
    Interrupted,
}

impl SyncError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error means the hash cache is corrupt.
    #[must_use]
    pub fn is_cache_corruption(&self) -> bool {
        matches!(self, Self::Cache(CacheError::Corrupted { .. }))
    }
}
