//! Directory walker with deterministic ordering and glob exclusions.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct which enumerates a directory
//! subtree on top of [`walkdir`]. The walk is single-threaded and fully
//! deterministic so that mirror runs are reproducible:
//!
//! - Regular files sort before subdirectories at every level, then by name
//! - Hidden entries are included
//! - Symbolic links are never followed nor yielded
//! - FIFOs, sockets and device nodes are skipped
//! - Exclusion globs match the full `/`-separated path relative to the
//!   walker root, not relative to the directory currently being read
//!
//! [`WalkOrder::PreOrder`] yields a directory before its children (the copy
//! phase creates mirror directories this way), [`WalkOrder::PostOrder`] after
//! them (the reconcile phase only removes a directory once its contents have
//! been handled).

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::{DirEntry, EntryKind, ScanError};

/// When directories are yielded relative to their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Directory first, then its contents.
    PreOrder,
    /// Contents first, then the directory.
    PostOrder,
}

/// Directory walker for deterministic file discovery.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Root that relative paths (and therefore exclusions) are computed from
    root: PathBuf,
    /// Compiled exclusion globs
    excludes: GlobSet,
}

impl Walker {
    /// Create a walker whose relative paths are computed against `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] if any exclusion glob does not compile.
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, ScanError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(false)
                .build()
                .map_err(|source| ScanError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            builder.add(glob);
        }

        let excludes = builder
            .build()
            .map_err(|source| ScanError::InvalidPattern {
                pattern: patterns.join(", "),
                source,
            })?;

        log::debug!(
            "Walker rooted at {} with {} exclusion pattern(s)",
            root.display(),
            patterns.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            excludes,
        })
    }

    /// The root relative paths are computed from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check whether a relative path, or any of its parent directories,
    /// matches an exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        if self.excludes.is_empty() {
            return false;
        }
        relative_path
            .match_indices('/')
            .map(|(idx, _)| &relative_path[..idx])
            .chain(std::iter::once(relative_path))
            .any(|candidate| self.excludes.is_match(candidate))
    }

    /// Compute the `/`-separated path of `path` relative to the walker root.
    ///
    /// Returns `Ok(None)` for paths that are not valid UTF-8, since those
    /// cannot be stored in the hash cache.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::OutsideRoot`] if `path` is not under the root.
    pub fn relative_path(&self, path: &Path) -> Result<Option<String>, ScanError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| ScanError::OutsideRoot(path.to_path_buf()))?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => match name.to_str() {
                    Some(name) => parts.push(name),
                    None => return Ok(None),
                },
                Component::CurDir => {}
                _ => return Err(ScanError::OutsideRoot(path.to_path_buf())),
            }
        }
        Ok(Some(parts.join("/")))
    }

    /// Walk `directory`, yielding files and directories below it.
    ///
    /// The iterator is lazy and holds no state beyond its own traversal, so
    /// calling `walk` again re-reads the tree from scratch. `directory` itself
    /// is never yielded. Errors are yielded as [`ScanError`] values.
    #[must_use]
    pub fn walk(&self, directory: &Path, order: WalkOrder) -> Walk<'_> {
        let inner = WalkDir::new(directory)
            .min_depth(1)
            .follow_links(false)
            .contents_first(order == WalkOrder::PostOrder)
            .sort_by(files_first)
            .into_iter();
        Walk {
            walker: self,
            inner,
            order,
        }
    }

    /// Predicate applied before an entry is yielded or descended into.
    fn keep(&self, entry: &walkdir::DirEntry) -> bool {
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_dir() {
            log::trace!("Skipping special file: {}", entry.path().display());
            return false;
        }

        match self.relative_path(entry.path()) {
            Ok(Some(relative)) => {
                if self.is_excluded(&relative) {
                    log::trace!("Excluding {}", relative);
                    return false;
                }
                true
            }
            Ok(None) => {
                log::warn!(
                    "Skipping path that is not valid UTF-8: {}",
                    entry.path().display()
                );
                false
            }
            // Let the conversion report it
            Err(_) => true,
        }
    }

    fn to_dir_entry(&self, entry: &walkdir::DirEntry) -> Result<Option<DirEntry>, ScanError> {
        let kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Ok(self
            .relative_path(entry.path())?
            .map(|relative_path| DirEntry {
                path: entry.path().to_path_buf(),
                kind,
                relative_path,
            }))
    }

    fn convert_error(&self, err: walkdir::Error) -> ScanError {
        let path = err
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        match err.io_error().map(std::io::Error::kind) {
            Some(std::io::ErrorKind::PermissionDenied) => ScanError::PermissionDenied(path),
            _ => ScanError::Io {
                path,
                source: err.into(),
            },
        }
    }
}

/// Iterator returned by [`Walker::walk`].
pub struct Walk<'a> {
    walker: &'a Walker,
    inner: walkdir::IntoIter,
    order: WalkOrder,
}

impl Iterator for Walk<'_> {
    type Item = Result<DirEntry, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(self.walker.convert_error(e))),
            };

            if !self.walker.keep(&entry) {
                // In post-order the directory arrives after its contents, which
                // `is_excluded` already filtered through the parent check.
                if self.order == WalkOrder::PreOrder && entry.file_type().is_dir() {
                    self.inner.skip_current_dir();
                }
                continue;
            }

            match self.walker.to_dir_entry(&entry) {
                Ok(Some(dir_entry)) => return Some(Ok(dir_entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Regular files before directories, then lexicographic by name.
fn files_first(a: &walkdir::DirEntry, b: &walkdir::DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}
