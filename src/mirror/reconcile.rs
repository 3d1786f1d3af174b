//! Disposal of mirror files that are no longer in the source.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::SyncError;
use crate::cache::HashCache;
use crate::target::TargetLayout;

/// What happened to a stale mirror file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleDisposition {
    /// Deleted because the same content lives at another mirror path.
    Deduplicated {
        /// Relative path of the surviving copy
        duplicate_of: String,
    },
    /// Moved into the archive.
    Archived {
        /// Archive location
        destination: PathBuf,
        /// Size of the archived file
        size: u64,
    },
}

/// First other cached path with the same digest as `relative_path` whose
/// mirror file exists and is `size` bytes long.
///
/// Candidates are tried in lexicographic order.
#[must_use]
pub fn find_duplicate(
    cache: &HashCache,
    layout: &TargetLayout,
    relative_path: &str,
    size: u64,
) -> Option<String> {
    cache
        .duplicates_of(relative_path)
        .find(|other| {
            fs::symlink_metadata(layout.mirror_path(other))
                .is_ok_and(|meta| meta.is_file() && meta.len() == size)
        })
        .map(str::to_string)
}

/// Delete or archive the stale mirror file at `relative_path`, then drop its
/// cache record.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the file cannot be inspected, removed or
/// moved.
pub fn dispose_stale_file(
    cache: &mut HashCache,
    layout: &TargetLayout,
    relative_path: &str,
) -> Result<StaleDisposition, SyncError> {
    let path = layout.mirror_path(relative_path);
    let size = fs::symlink_metadata(&path)
        .map_err(SyncError::io(&path))?
        .len();

    let disposition = match find_duplicate(cache, layout, relative_path, size) {
        Some(duplicate_of) => {
            log::info!("Deduplicating {} (same as {})", relative_path, duplicate_of);
            fs::remove_file(&path).map_err(SyncError::io(&path))?;
            StaleDisposition::Deduplicated { duplicate_of }
        }
        None => {
            let destination = layout.archive_path(relative_path);
            log::info!("Archiving {}", relative_path);
            archive_file(layout, relative_path, &path, &destination)?;
            StaleDisposition::Archived { destination, size }
        }
    };

    cache.forget(relative_path);
    Ok(disposition)
}

/// Remove a mirror directory that no longer exists in the source.
///
/// # Errors
///
/// Returns [`SyncError::DirectoryNotEmpty`] if anything is still inside it.
pub fn remove_stale_dir(layout: &TargetLayout, relative_path: &str) -> Result<(), SyncError> {
    let path = layout.mirror_path(relative_path);
    log::debug!("Removing directory {}", relative_path);
    match fs::remove_dir(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
            Err(SyncError::DirectoryNotEmpty(path))
        }
        Err(e) => Err(SyncError::io(&path)(e)),
    }
}

/// Move `source` to `destination`, creating parent directories and
/// replacing an older archived file with the same name.
///
/// An archived entry of the other kind in the way (a file where a parent
/// directory is needed, or a directory where the file goes) is renamed
/// aside first.
fn archive_file(
    layout: &TargetLayout,
    relative_path: &str,
    source: &Path,
    destination: &Path,
) -> Result<(), SyncError> {
    for (idx, _) in relative_path.match_indices('/') {
        let ancestor = layout.archive_path(&relative_path[..idx]);
        if fs::symlink_metadata(&ancestor).is_ok_and(|meta| !meta.is_dir()) {
            move_aside(&ancestor)?;
        }
    }
    if fs::symlink_metadata(destination).is_ok_and(|meta| meta.is_dir()) {
        move_aside(destination)?;
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(SyncError::io(parent))?;
    }
    fs::rename(source, destination).map_err(SyncError::io(destination))
}

/// Rename `path` to the first free `<name>~<n>` next to it.
fn move_aside(path: &Path) -> Result<PathBuf, SyncError> {
    let name = path.file_name().unwrap_or_default();
    let mut n = 1u32;
    loop {
        let mut candidate_name = name.to_os_string();
        candidate_name.push(format!("~{n}"));
        let candidate = path.with_file_name(candidate_name);
        match fs::symlink_metadata(&candidate) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Moving archived {} aside to {}",
                    path.display(),
                    candidate.display()
                );
                fs::rename(path, &candidate).map_err(SyncError::io(&candidate))?;
                return Ok(candidate);
            }
            Err(e) => return Err(SyncError::io(&candidate)(e)),
            Ok(_) => n += 1,
        }
    }
}
