//! Structured error handling and exit codes.

use serde::Serialize;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::mirror::SyncError;
use crate::target::TargetError;

/// Exit codes for the RustMirror application.
///
/// - 0: Success
/// - 1: General error (unexpected failure)
/// - 2: Unknown configuration scope
/// - 3: Source or target directory missing
/// - 4: Target not initialized, or init refused because it is not empty
/// - 5: Target is bound to a different source
/// - 6: Target locked by another run
/// - 100: Hash cache corruption
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: The command completed.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// The requested scope is not configured.
    UnknownScope = 2,
    /// Source or target directory does not exist.
    InvalidDirectory = 3,
    /// Target has no marker, has an invalid one, or cannot be initialized.
    NotInitialized = 4,
    /// Target belongs to another source.
    SourceMismatch = 5,
    /// Another run holds the target lock.
    Locked = 6,
    /// A hash cache or journal line is malformed.
    CacheCorrupted = 100,
    /// Interrupted: The run was interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "RM000",
            Self::GeneralError => "RM001",
            Self::UnknownScope => "RM002",
            Self::InvalidDirectory => "RM003",
            Self::NotInitialized => "RM004",
            Self::SourceMismatch => "RM005",
            Self::Locked => "RM006",
            Self::CacheCorrupted => "RM100",
            Self::Interrupted => "RM130",
        }
    }

    /// Pick the exit code for an application error.
    ///
    /// Walks the error chain, so context added with `anyhow` does not hide
    /// the library error underneath.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| {
                if let Some(e) = cause.downcast_ref::<SyncError>() {
                    Some(Self::for_sync_error(e))
                } else if let Some(e) = cause.downcast_ref::<TargetError>() {
                    Some(Self::for_target_error(e))
                } else if let Some(e) = cause.downcast_ref::<CacheError>() {
                    Some(Self::for_cache_error(e))
                } else {
                    cause.downcast_ref::<ConfigError>().map(|e| match e {
                        ConfigError::UnknownScope { .. } => Self::UnknownScope,
                        _ => Self::GeneralError,
                    })
                }
            })
            .unwrap_or(Self::GeneralError)
    }

    fn for_sync_error(err: &SyncError) -> Self {
        match err {
            SyncError::Target(e) => Self::for_target_error(e),
            SyncError::Cache(e) => Self::for_cache_error(e),
            SyncError::Interrupted => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }

    fn for_target_error(err: &TargetError) -> Self {
        match err {
            TargetError::SourceMissing(_) | TargetError::TargetMissing(_) => {
                Self::InvalidDirectory
            }
            TargetError::NotEmpty(_)
            | TargetError::NotInitialized(_)
            | TargetError::InvalidMarker { .. } => Self::NotInitialized,
            TargetError::SourceMismatch { .. } => Self::SourceMismatch,
            TargetError::Locked(_) => Self::Locked,
            _ => Self::GeneralError,
        }
    }

    fn for_cache_error(err: &CacheError) -> Self {
        match err {
            CacheError::Corrupted { .. } => Self::CacheCorrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "RM001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
