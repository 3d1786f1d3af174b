//! Progress reporting utilities using indicatif.
//!
//! The synchronizer reports through the [`ProgressCallback`] trait so the
//! core never depends on a terminal. [`Progress`] is the indicatif-backed
//! implementation used by the CLI: one spinner per phase, showing the number
//! of entries visited, the bytes copied so far and the current path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};

/// Name of the copy phase.
pub const PHASE_COPY: &str = "copy";
/// Name of the reconciliation phase.
pub const PHASE_RECONCILE: &str = "reconcile";
/// Name of the cache compaction phase.
pub const PHASE_COMPACT: &str = "compact";

/// Progress callback for the phases of a mirror run.
///
/// Implement this trait to receive progress updates from a
/// [`Synchronizer`](crate::mirror::Synchronizer).
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase ([`PHASE_COPY`], [`PHASE_RECONCILE`], [`PHASE_COMPACT`])
    fn on_phase_start(&self, phase: &str);

    /// Called for each entry visited.
    ///
    /// # Arguments
    ///
    /// * `current` - Number of entries visited so far in this phase (1-based)
    /// * `path` - Relative path of the entry
    fn on_progress(&self, current: usize, path: &str);

    /// Called after a file has been copied.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Size of the copied file
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif spinners.
pub struct Progress {
    active: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            active: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix:>9} [{elapsed_precise}] {pos} entries {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::style());
        pb.set_prefix(phase_label(phase));
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }

        let copied = ByteSize::b(self.bytes.load(Ordering::Relaxed));
        self.with_bar(|pb| {
            pb.set_position(current as u64);
            pb.set_message(format!("({copied} copied) {}", truncate_path(path, 40)));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        if let Ok(mut active) = self.active.lock() {
            if let Some(pb) = active.take() {
                pb.finish_with_message(format!("{} done", phase_label(phase).trim()));
            }
        }
    }
}

fn phase_label(phase: &str) -> &'static str {
    match phase {
        PHASE_COPY => "Copying",
        PHASE_RECONCILE => "Archiving",
        PHASE_COMPACT => "Caching",
        _ => "Working",
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        return path.to_string();
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);
    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
