//! Cache record definitions and the on-disk line codec.
//!
//! Every cache file (base, journal, merge side file) is a sequence of lines:
//!
//! ```text
//! <hex digest> <decimal size> <relative path>
//! ```
//!
//! Fields are separated by the first two spaces; everything after the second
//! space is the path, so paths may contain spaces. The digest length is
//! checked against the target's [`HashAlgorithm`].

use std::fmt;

use crate::scanner::HashAlgorithm;

/// Digest and size of one mirrored file, keyed by relative path in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// Lowercase hex digest of the file content
    pub digest: String,
    /// File size in bytes
    pub size: u64,
}

impl CacheRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(digest: impl Into<String>, size: u64) -> Self {
        Self {
            digest: digest.into(),
            size,
        }
    }
}

/// Why a cache line could not be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    /// Fewer than three space-separated fields.
    #[error("missing field")]
    MissingField,
    /// Digest has the wrong length or non-hex characters.
    #[error("invalid {algorithm} digest '{digest}'")]
    InvalidDigest {
        /// Expected algorithm
        algorithm: HashAlgorithm,
        /// The digest text found
        digest: String,
    },
    /// Size is not a non-negative integer.
    #[error("invalid size '{0}'")]
    InvalidSize(String),
    /// Path field is empty.
    #[error("empty path")]
    EmptyPath,
}

/// One parsed line of a cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLine {
    /// Relative path in the mirror
    pub path: String,
    /// Digest and size
    pub record: CacheRecord,
}

impl CacheLine {
    /// Create a line from its parts.
    #[must_use]
    pub fn new(path: impl Into<String>, record: CacheRecord) -> Self {
        Self {
            path: path.into(),
            record,
        }
    }

    /// Parse a line (without its trailing newline).
    ///
    /// # Errors
    ///
    /// Returns a [`LineError`] describing the first problem found.
    pub fn parse(line: &str, algorithm: HashAlgorithm) -> Result<Self, LineError> {
        let mut fields = line.splitn(3, ' ');
        let (Some(digest), Some(size), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(LineError::MissingField);
        };

        if !algorithm.is_valid_digest(digest) {
            return Err(LineError::InvalidDigest {
                algorithm,
                digest: digest.to_string(),
            });
        }
        let size = size
            .parse::<u64>()
            .map_err(|_| LineError::InvalidSize(size.to_string()))?;
        if path.is_empty() {
            return Err(LineError::EmptyPath);
        }

        Ok(Self::new(path, CacheRecord::new(digest, size)))
    }
}

impl fmt::Display for CacheLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.record.digest, self.record.size, self.path)
    }
}
