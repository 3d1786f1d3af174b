//! Command-line interface definitions for RustMirror.
//!
//! This module defines all CLI arguments and subcommands using the clap derive API.
//! Global options (verbosity, color, error format, config file) apply to every
//! subcommand; source and target paths come from named scopes in the config file.
//!
//! # Example
//!
//! ```bash
//! # Prepare an empty target directory for the "photos" scope
//! rustmirror init photos
//!
//! # Back up the "photos" scope
//! rustmirror sync photos
//!
//! # Verbose mode for debugging, with an explicit scopes file
//! rustmirror -v --config ./scopes.toml sync photos
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CONFIG_ENV_VAR;
use crate::scanner::HashAlgorithm;

/// Versioned mirror backup.
///
/// RustMirror keeps an exact mirror of a source directory and moves files that
/// disappear from the source into an archive instead of deleting them, unless
/// the same content still exists elsewhere in the mirror.
#[derive(Debug, Parser)]
#[command(name = "rustmirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Scopes file (default: scopes.toml in the platform config directory)
    #[arg(long, global = true, value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for RustMirror.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mirror a scope's source into its target
    Sync(SyncArgs),
    /// Prepare an empty target directory for a scope
    Init(InitArgs),
    /// List configured scopes
    Scopes,
}

/// Arguments for the sync subcommand.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Name of the scope to back up
    #[arg(value_name = "SCOPE")]
    pub scope: String,

    /// Additional glob patterns to exclude (can be specified multiple times)
    ///
    /// Added to the scope's own exclusions. Patterns match paths relative to
    /// the source root; `*` also matches `/`.
    #[arg(short, long, value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

/// Arguments for the init subcommand.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Name of the scope whose target is initialized
    #[arg(value_name = "SCOPE")]
    pub scope: String,

    /// Digest algorithm for the hash cache (overrides the scope setting)
    #[arg(long, value_enum)]
    pub algorithm: Option<AlgorithmArg>,
}

/// Digest algorithm choices on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmArg {
    /// MD5 (32 hex digits)
    Md5,
    /// SHA-1 (40 hex digits)
    Sha1,
    /// SHA-256 (64 hex digits)
    Sha256,
    /// BLAKE3 (64 hex digits)
    Blake3,
}

impl From<AlgorithmArg> for HashAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Md5 => Self::Md5,
            AlgorithmArg::Sha1 => Self::Sha1,
            AlgorithmArg::Sha256 => Self::Sha256,
            AlgorithmArg::Blake3 => Self::Blake3,
        }
    }
}
