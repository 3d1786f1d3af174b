//! Target directory layout, first-time setup and the run lock.
//!
//! A target directory holds everything a mirror run persists:
//!
//! ```text
//! <target>/
//!   rustmirror.toml     marker binding the target to one source path
//!   rustmirror.lock     held exclusively for the duration of a run
//!   mirror/             live replica of the source tree
//!   archive/            files removed from the source
//!   <alg>.txt           hash cache (see crate::cache)
//!   <alg>-update.txt
//!   temp.copying        staging slot for in-flight copies
//! ```
//!
//! The marker is written once by [`init_target`] and checked on every run by
//! [`verify_binding`], so a populated target can never be mirrored from a
//! different source by accident.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::cache::CacheFiles;
use crate::scanner::HashAlgorithm;

/// Name of the marker file at the target root.
pub const MARKER_FILE_NAME: &str = "rustmirror.toml";
/// Name of the lock file at the target root.
pub const LOCK_FILE_NAME: &str = "rustmirror.lock";
/// Name of the staging file for in-flight copies.
pub const STAGING_FILE_NAME: &str = "temp.copying";
/// Directory holding the live mirror.
pub const MIRROR_DIR_NAME: &str = "mirror";
/// Directory holding archived files.
pub const ARCHIVE_DIR_NAME: &str = "archive";
/// Entries a fresh filesystem may already contain; ignored when checking
/// that a target is empty before initialization.
pub const RESERVED_ENTRIES: &[&str] = &["lost+found"];

/// Errors about the source/target pair.
#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    /// Source directory does not exist.
    #[error("Source directory does not exist: {0}")]
    SourceMissing(PathBuf),

    /// Target directory does not exist.
    #[error("Target directory does not exist: {0}")]
    TargetMissing(PathBuf),

    /// Target contains entries and cannot be initialized.
    #[error("Target directory is not empty: {0}")]
    NotEmpty(PathBuf),

    /// Target has no marker file.
    #[error("Target directory {0} has not been set up as a mirror target, run `init` first")]
    NotInitialized(PathBuf),

    /// Marker names a different source.
    #[error("Target is bound to source {bound}, not {requested}")]
    SourceMismatch {
        /// Source recorded in the marker
        bound: PathBuf,
        /// Source of the current run
        requested: PathBuf,
    },

    /// Marker exists but cannot be parsed.
    #[error("Invalid marker file {path}: {source}")]
    InvalidMarker {
        /// Marker path
        path: PathBuf,
        /// Parse error
        #[source]
        source: toml::de::Error,
    },

    /// Marker could not be serialized.
    #[error("Failed to serialize marker: {0}")]
    MarkerSerialize(#[from] toml::ser::Error),

    /// Another run holds the lock.
    #[error("Target is locked by another run: {0}")]
    Locked(PathBuf),

    /// Filesystem error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TargetError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Contents of the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Source directory this target mirrors
    pub source: PathBuf,
    /// Digest algorithm of the hash cache
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

/// Every path a run reads or writes under a target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    /// Target root
    pub root: PathBuf,
    /// Live mirror
    pub mirror: PathBuf,
    /// Archive of removed files
    pub archive: PathBuf,
    /// Staging file for copies
    pub staging: PathBuf,
    /// Marker file
    pub marker: PathBuf,
    /// Lock file
    pub lock: PathBuf,
}

impl TargetLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            mirror: root.join(MIRROR_DIR_NAME),
            archive: root.join(ARCHIVE_DIR_NAME),
            staging: root.join(STAGING_FILE_NAME),
            marker: root.join(MARKER_FILE_NAME),
            lock: root.join(LOCK_FILE_NAME),
        }
    }

    /// Hash cache files for `algorithm`.
    #[must_use]
    pub fn cache_files(&self, algorithm: HashAlgorithm) -> CacheFiles {
        CacheFiles::new(&self.root, algorithm)
    }

    /// Absolute mirror path of a `/`-separated relative path.
    #[must_use]
    pub fn mirror_path(&self, relative: &str) -> PathBuf {
        resolve(&self.mirror, relative)
    }

    /// Absolute archive path of a `/`-separated relative path.
    #[must_use]
    pub fn archive_path(&self, relative: &str) -> PathBuf {
        resolve(&self.archive, relative)
    }
}

/// Join a `/`-separated relative path onto `root`.
#[must_use]
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Drop trailing separators and `.` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components().collect()
}

fn require_dir(path: &Path, missing: fn(PathBuf) -> TargetError) -> Result<(), TargetError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(missing(path.to_path_buf()))
    }
}

/// Read the marker of `target`.
///
/// # Errors
///
/// Returns [`TargetError::NotInitialized`] if there is no marker and
/// [`TargetError::InvalidMarker`] if it cannot be parsed.
pub fn read_marker(target: &Path) -> Result<Marker, TargetError> {
    let layout = TargetLayout::new(target);
    let content = match fs::read_to_string(&layout.marker) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TargetError::NotInitialized(target.to_path_buf()))
        }
        Err(e) => return Err(TargetError::io(&layout.marker)(e)),
    };
    toml::from_str(&content).map_err(|source| TargetError::InvalidMarker {
        path: layout.marker.clone(),
        source,
    })
}

/// Initialize an empty `target` as the mirror of `source`.
///
/// # Errors
///
/// Fails if either directory is missing, if the target holds anything other
/// than [`RESERVED_ENTRIES`], or if the marker cannot be written.
pub fn init_target(
    source: &Path,
    target: &Path,
    algorithm: HashAlgorithm,
) -> Result<TargetLayout, TargetError> {
    let source = normalize_path(source);
    let target = normalize_path(target);
    require_dir(&source, TargetError::SourceMissing)?;
    require_dir(&target, TargetError::TargetMissing)?;

    let mut entries = fs::read_dir(&target).map_err(TargetError::io(&target))?;
    let occupied = entries.try_fold(false, |occupied, entry| {
        let entry = entry?;
        let reserved = entry
            .file_name()
            .to_str()
            .is_some_and(|name| RESERVED_ENTRIES.contains(&name));
        Ok::<_, io::Error>(occupied || !reserved)
    });
    if occupied.map_err(TargetError::io(&target))? {
        return Err(TargetError::NotEmpty(target));
    }

    let layout = TargetLayout::new(&target);
    let marker = Marker { source, algorithm };
    fs::write(&layout.marker, toml::to_string(&marker)?)
        .map_err(TargetError::io(&layout.marker))?;

    log::info!(
        "Initialized {} as mirror of {} ({})",
        target.display(),
        marker.source.display(),
        algorithm
    );
    Ok(layout)
}

/// Check that `target` is an initialized mirror of `source`.
///
/// # Errors
///
/// Returns the matching [`TargetError`] for a missing directory, a missing
/// marker or a marker bound to another source.
pub fn verify_binding(source: &Path, target: &Path) -> Result<(TargetLayout, Marker), TargetError> {
    let source = normalize_path(source);
    let target = normalize_path(target);
    require_dir(&source, TargetError::SourceMissing)?;
    require_dir(&target, TargetError::TargetMissing)?;

    let marker = read_marker(&target)?;
    if normalize_path(&marker.source) != source {
        return Err(TargetError::SourceMismatch {
            bound: marker.source,
            requested: source,
        });
    }
    Ok((TargetLayout::new(&target), marker))
}

/// Exclusive lock on a target, released on drop.
#[derive(Debug)]
pub struct TargetLock {
    file: File,
    path: PathBuf,
}

impl TargetLock {
    /// Take the lock without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::Locked`] if another process holds it.
    pub fn acquire(layout: &TargetLayout) -> Result<Self, TargetError> {
        let path = layout.lock.clone();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(TargetError::io(&path))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                log::debug!("Acquired lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(TargetError::Locked(path))
            }
            Err(e) => Err(TargetError::io(&path)(e)),
        }
    }
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
