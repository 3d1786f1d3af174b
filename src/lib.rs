//! RustMirror - Versioned Mirror Backup
//!
//! Keeps `<target>/mirror` identical to a source directory. Files that leave
//! the source are moved to `<target>/archive`, unless the same content (by
//! digest and size) still exists elsewhere in the mirror, in which case the
//! stale copy is simply removed. A journaled hash cache makes that decision
//! without rehashing anything.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod progress;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod target;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, InitArgs, SyncArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::mirror::{SyncOptions, Synchronizer};
use crate::progress::Progress;
use crate::scanner::HashAlgorithm;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns the first fatal error; use [`ExitCode::for_error`] to pick the
/// process exit status.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("Failed to load scopes")?;

    match cli.command {
        Commands::Sync(args) => sync_scope(&config, &args, cli.quiet),
        Commands::Init(args) => init_scope(&config, &args),
        Commands::Scopes => list_scopes(&config),
    }
}

fn sync_scope(config: &Config, args: &SyncArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let scope = config.scope(&args.scope)?;
    let exclude = scope
        .exclude
        .iter()
        .chain(&args.exclude)
        .cloned()
        .collect();

    let handler = signal::install_handler()?;
    let options = SyncOptions::new(&scope.source, &scope.target).with_exclude(exclude);
    let summary = Synchronizer::new(options)
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(Arc::new(Progress::new(quiet)))
        .run()
        .with_context(|| format!("Backup of scope '{}' failed", args.scope))?;

    if !quiet {
        report::print_summary(&mut io::stdout().lock(), &summary)?;
    }
    Ok(ExitCode::Success)
}

fn init_scope(config: &Config, args: &InitArgs) -> anyhow::Result<ExitCode> {
    let scope = config.scope(&args.scope)?;
    let algorithm = args
        .algorithm
        .map_or(scope.algorithm, HashAlgorithm::from);

    let layout = target::init_target(&scope.source, &scope.target, algorithm)
        .with_context(|| format!("Failed to initialize scope '{}'", args.scope))?;
    log::info!(
        "Target {} is ready, run `rustmirror sync {}` to start",
        layout.root.display(),
        args.scope
    );
    Ok(ExitCode::Success)
}

fn list_scopes(config: &Config) -> anyhow::Result<ExitCode> {
    let mut out = io::stdout().lock();
    if config.scopes.is_empty() {
        log::warn!("No scopes configured");
    }
    for (name, scope) in &config.scopes {
        writeln!(
            out,
            "{name}: {} -> {}",
            scope.source.display(),
            scope.target.display()
        )?;
    }
    Ok(ExitCode::Success)
}
