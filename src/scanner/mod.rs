//! Scanner module for directory traversal, content hashing and copying.
//!
//! This module provides functionality for:
//! - Deterministic directory walking with glob exclusions
//! - Content hashing with a pluggable digest algorithm
//! - Streaming copy-with-hash through a staging file
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and exclusion filtering
//! - [`hasher`]: Digest algorithms and streaming hashing
//! - [`copier`]: Atomic copy with hash and metadata preservation
//!
//! # Example
//!
//! ```no_run
//! use rustmirror::scanner::{Walker, WalkOrder};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Documents"), &["*.tmp".to_string()])?;
//! for entry in walker.walk(Path::new("/home/user/Documents"), WalkOrder::PreOrder) {
//!     let entry = entry?;
//!     println!("{:?} {}", entry.kind, entry.relative_path);
//! }
//! # Ok::<(), rustmirror::scanner::ScanError>(())
//! ```

pub mod copier;
pub mod hasher;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use copier::{CopyError, CopyOutcome, Copier, COPY_BLOCK_SIZE};
pub use hasher::{HashAlgorithm, Hasher};
pub use walker::{Walk, WalkOrder, Walker};

/// Kind of a walked entry. Anything else is never yielded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// An entry discovered by the [`Walker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Absolute path to the entry
    pub path: PathBuf,
    /// Whether this is a file or a directory
    pub kind: EntryKind,
    /// Path relative to the walker root, always `/`-separated
    pub relative_path: String,
}

impl DirEntry {
    /// Returns `true` for directory entries.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// An exclusion pattern could not be compiled.
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// The underlying glob error
        #[source]
        source: globset::Error,
    },

    /// Permission was denied when listing a directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An entry was found outside of the walker root.
    #[error("Path is outside of walk root: {0}")]
    OutsideRoot(PathBuf),

    /// An I/O error occurred while reading a directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
