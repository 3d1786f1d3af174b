//! Streaming copy-with-hash through a staging file.
//!
//! # Overview
//!
//! [`Copier::copy_with_hash`] streams a source file into a staging file inside
//! the target directory while feeding every block into a running digest. Once
//! the stream is complete and synced, the source's access/modification times
//! and permission bits are applied to the staging file and it is renamed onto
//! the destination. The rename happens on the same filesystem, so the
//! destination is either absent, the previous version, or the complete new
//! version, never a partial write.
//!
//! The staging path is a single slot per target. Copies into one target are
//! therefore sequential; concurrent copies would each need their own staging
//! name.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;

use super::hasher::HashAlgorithm;

/// Block size for streaming copies (8 MiB).
///
/// Large enough to keep syscall overhead low on big files while bounding memory.
pub const COPY_BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// Result of a copy attempt that did not fail the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The destination now holds the source content.
    Copied {
        /// Hex digest of the copied content
        digest: String,
        /// Number of bytes copied
        size: u64,
    },
    /// The source could not be opened for reading (permission denied).
    Skipped,
}

/// Errors that abort a copy.
#[derive(thiserror::Error, Debug)]
pub enum CopyError {
    /// Reading the source failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Source path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Writing or finalizing the staging file failed.
    #[error("Failed to write staging file {path}: {source}")]
    Write {
        /// Staging path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Publishing the staging file onto the destination failed.
    #[error("Failed to move staging file onto {path}: {source}")]
    Publish {
        /// Destination path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Copies files into a target through its staging file.
#[derive(Debug)]
pub struct Copier {
    staging: PathBuf,
    algorithm: HashAlgorithm,
    buffer: Vec<u8>,
}

impl Copier {
    /// Create a copier that stages through `staging` and hashes with `algorithm`.
    #[must_use]
    pub fn new(staging: PathBuf, algorithm: HashAlgorithm) -> Self {
        Self::with_block_size(staging, algorithm, COPY_BLOCK_SIZE)
    }

    /// Create a copier with a custom block size.
    #[must_use]
    pub fn with_block_size(staging: PathBuf, algorithm: HashAlgorithm, block_size: usize) -> Self {
        Self {
            staging,
            algorithm,
            buffer: vec![0u8; block_size.max(1)],
        }
    }

    /// The staging file path.
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Remove a staging file left behind by an interrupted run.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear_staging(&self) -> Result<(), CopyError> {
        match fs::remove_file(&self.staging) {
            Ok(()) => {
                log::debug!("Removed stale staging file {}", self.staging.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CopyError::Write {
                path: self.staging.clone(),
                source,
            }),
        }
    }

    /// Copy `source` to `destination`, returning the content digest.
    ///
    /// A source that cannot be opened because of missing permissions is not
    /// an error: it is logged and reported as [`CopyOutcome::Skipped`] so the
    /// run can continue.
    ///
    /// # Errors
    ///
    /// Returns a [`CopyError`] for any other I/O failure.
    pub fn copy_with_hash(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> Result<CopyOutcome, CopyError> {
        let mut reader = match File::open(source) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::warn!("Skipping {}, access denied.", source.display());
                self.clear_staging()?;
                return Ok(CopyOutcome::Skipped);
            }
            Err(e) => {
                return Err(CopyError::Read {
                    path: source.to_path_buf(),
                    source: e,
                })
            }
        };

        let metadata = reader.metadata().map_err(|e| self.read_error(source, e))?;
        let (digest, size) = self.stream_to_staging(&mut reader, source)?;
        drop(reader);

        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(&self.staging, atime, mtime)
            .map_err(|e| self.write_error(e))?;
        fs::set_permissions(&self.staging, metadata.permissions())
            .map_err(|e| self.write_error(e))?;

        fs::rename(&self.staging, destination).map_err(|source| CopyError::Publish {
            path: destination.to_path_buf(),
            source,
        })?;

        log::trace!("Copied {} bytes to {} ({})", size, destination.display(), digest);
        Ok(CopyOutcome::Copied { digest, size })
    }

    /// Stream `reader` into the staging file, returning digest and byte count.
    fn stream_to_staging(
        &mut self,
        reader: &mut File,
        source: &Path,
    ) -> Result<(String, u64), CopyError> {
        let mut writer = File::create(&self.staging).map_err(|e| self.write_error(e))?;
        let mut hasher = self.algorithm.hasher();
        let mut size = 0u64;

        loop {
            let bytes_read = match reader.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_error(source, e)),
            };
            let block = &self.buffer[..bytes_read];
            hasher.update(block);
            writer.write_all(block).map_err(|e| CopyError::Write {
                path: self.staging.clone(),
                source: e,
            })?;
            size += bytes_read as u64;
        }

        writer.sync_all().map_err(|e| self.write_error(e))?;
        Ok((hasher.finalize_hex(), size))
    }

    fn read_error(&self, path: &Path, source: io::Error) -> CopyError {
        CopyError::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write_error(&self, source: io::Error) -> CopyError {
        CopyError::Write {
            path: self.staging.clone(),
            source,
        }
    }
}
