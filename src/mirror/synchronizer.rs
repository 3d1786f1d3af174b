//! The mirror run state machine.
//!
//! # Example
//!
//! ```no_run
//! use rustmirror::mirror::{SyncOptions, Synchronizer};
//!
//! let options = SyncOptions::new("/home/user/Pictures", "/mnt/backup/pictures")
//!     .with_exclude(vec!["*.tmp".to_string()]);
//! let summary = Synchronizer::new(options).run()?;
//! println!("{} files up to date", summary.files_up_to_date);
//! # Ok::<(), rustmirror::mirror::SyncError>(())
//! ```

use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use filetime::FileTime;

use super::reconcile::{dispose_stale_file, remove_stale_dir, StaleDisposition};
use super::{SyncError, SyncOptions, SyncSummary};
use crate::cache::HashCache;
use crate::progress::{ProgressCallback, PHASE_COMPACT, PHASE_COPY, PHASE_RECONCILE};
use crate::scanner::{CopyError, CopyOutcome, Copier, DirEntry, WalkOrder, Walker};
use crate::target::{normalize_path, verify_binding, TargetLayout, TargetLock};

/// Mirrors one source tree into one target.
pub struct Synchronizer {
    options: SyncOptions,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("options", &self.options)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Synchronizer {
    /// Create a synchronizer for `options`.
    #[must_use]
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Run one full synchronization.
    ///
    /// # Errors
    ///
    /// Any [`SyncError`] aborts the run. Files copied before the error are
    /// already journaled and are picked up by the next run.
    pub fn run(&self) -> Result<SyncSummary, SyncError> {
        let source = normalize_path(&self.options.source);
        let target = normalize_path(&self.options.target);

        let (layout, marker) = verify_binding(&source, &target)?;
        let _lock = TargetLock::acquire(&layout)?;
        fs::create_dir_all(&layout.mirror).map_err(SyncError::io(&layout.mirror))?;

        let copier = Copier::new(layout.staging.clone(), marker.algorithm);
        copier.clear_staging()?;

        let mut cache = HashCache::open(layout.cache_files(marker.algorithm), marker.algorithm)?;
        cache.begin_journal()?;
        log::debug!(
            "Loaded {} cache record(s) for {} ({})",
            cache.len(),
            layout.root.display(),
            marker.algorithm
        );

        let mut run = Run {
            sync: self,
            source_walker: Arc::new(Walker::new(&source, &self.options.exclude)?),
            mirror_walker: Arc::new(Walker::new(&layout.mirror, &self.options.exclude)?),
            layout,
            cache,
            copier,
            source_files: HashSet::new(),
            source_dirs: HashSet::new(),
            retained_dirs: HashSet::new(),
            summary: SyncSummary::default(),
        };

        run.copy_phase()?;
        run.prune();
        run.reconcile_phase()?;
        run.prune();
        run.compact()?;
        Ok(run.summary)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn check_shutdown(&self, phase: &str) -> Result<(), SyncError> {
        if self.is_shutdown_requested() {
            log::info!("{} phase interrupted by shutdown signal", phase);
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }

    fn phase_start(&self, phase: &str) {
        log::debug!("Starting {} phase", phase);
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start(phase);
        }
    }

    fn phase_end(&self, phase: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end(phase);
        }
        log::debug!("Finished {} phase", phase);
    }

    fn progress(&self, current: usize, path: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_progress(current, path);
        }
    }

    fn item_completed(&self, bytes: u64) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_item_completed(bytes);
        }
    }
}

/// State of one run, from load to report.
struct Run<'a> {
    sync: &'a Synchronizer,
    source_walker: Arc<Walker>,
    mirror_walker: Arc<Walker>,
    layout: TargetLayout,
    cache: HashCache,
    copier: Copier,
    source_files: HashSet<String>,
    source_dirs: HashSet<String>,
    /// Stale mirror directories kept because excluded entries remain inside
    retained_dirs: HashSet<String>,
    summary: SyncSummary,
}

impl Run<'_> {
    fn copy_phase(&mut self) -> Result<(), SyncError> {
        self.sync.phase_start(PHASE_COPY);

        let walker = Arc::clone(&self.source_walker);
        let mut visited = 0;
        for entry in walker.walk(walker.root(), WalkOrder::PreOrder) {
            self.sync.check_shutdown(PHASE_COPY)?;
            let entry = entry?;
            visited += 1;
            self.sync.progress(visited, &entry.relative_path);

            if entry.is_dir() {
                self.mirror_dir(&entry)?;
            } else {
                self.mirror_file(&entry)?;
            }
        }

        self.summary.files_up_to_date = self.source_files.len();
        self.summary.dirs_up_to_date = self.source_dirs.len();
        self.sync.phase_end(PHASE_COPY);
        Ok(())
    }

    fn mirror_dir(&mut self, entry: &DirEntry) -> Result<(), SyncError> {
        let destination = self.layout.mirror_path(&entry.relative_path);
        match fs::symlink_metadata(&destination) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                // A file in the mirror became a directory in the source
                self.dispose(&entry.relative_path)?;
                fs::create_dir(&destination).map_err(SyncError::io(&destination))?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Creating directory {}", entry.relative_path);
                fs::create_dir(&destination).map_err(SyncError::io(&destination))?;
            }
            Err(e) => return Err(SyncError::io(&destination)(e)),
        }
        self.source_dirs.insert(entry.relative_path.clone());
        Ok(())
    }

    fn mirror_file(&mut self, entry: &DirEntry) -> Result<(), SyncError> {
        let relative = &entry.relative_path;
        if relative.contains('\n') {
            log::warn!("Skipping {:?}, file names with newlines are not supported.", relative);
            self.summary.files_skipped += 1;
            self.source_files.insert(relative.clone());
            return Ok(());
        }

        let source_meta = match fs::symlink_metadata(&entry.path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("Skipping {}, it vanished during the backup.", relative);
                return Ok(());
            }
            Err(e) => return Err(SyncError::io(&entry.path)(e)),
        };
        self.source_files.insert(relative.clone());

        let destination = self.layout.mirror_path(relative);
        if !self.needs_copy(relative, &source_meta, &destination)? {
            log::trace!("Up to date: {}", relative);
            return Ok(());
        }

        log::info!("Updating {}", relative);
        match self.copier.copy_with_hash(&entry.path, &destination) {
            Ok(CopyOutcome::Copied { digest, size }) => {
                self.cache.record(relative, &digest, size)?;
                self.summary.files_updated += 1;
                self.summary.bytes_copied += size;
                self.sync.item_completed(size);
            }
            Ok(CopyOutcome::Skipped) => self.summary.files_skipped += 1,
            Err(CopyError::Read { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::warn!("Skipping {}, it vanished during the backup.", relative);
                self.source_files.remove(relative);
                self.copier.clear_staging()?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Whether the mirror copy is missing or differs in size or mtime.
    fn needs_copy(
        &mut self,
        relative: &str,
        source: &Metadata,
        destination: &Path,
    ) -> Result<bool, SyncError> {
        let mirror = match fs::symlink_metadata(destination) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(SyncError::io(destination)(e)),
        };

        if mirror.is_dir() {
            // A directory in the mirror became a file in the source
            self.reconcile_tree(destination)?;
            remove_stale_dir(&self.layout, relative)?;
            self.summary.dirs_removed += 1;
            return Ok(true);
        }

        Ok(mirror.len() != source.len()
            || FileTime::from_last_modification_time(&mirror)
                != FileTime::from_last_modification_time(source))
    }

    fn prune(&mut self) {
        let layout = &self.layout;
        let pruned = self.cache.prune(|relative| {
            fs::symlink_metadata(layout.mirror_path(relative)).is_ok_and(|meta| meta.is_file())
        });
        if pruned > 0 {
            log::debug!("Pruned {} cache record(s) for files missing from the mirror", pruned);
        }
        self.summary.records_pruned += pruned;
    }

    fn reconcile_phase(&mut self) -> Result<(), SyncError> {
        self.sync.phase_start(PHASE_RECONCILE);
        let mirror = self.layout.mirror.clone();
        self.reconcile_tree(&mirror)?;
        self.sync.phase_end(PHASE_RECONCILE);
        Ok(())
    }

    /// Post-order walk of `directory` in the mirror, removing every
    /// directory and disposing of every file the source no longer has.
    fn reconcile_tree(&mut self, directory: &Path) -> Result<(), SyncError> {
        let walker = Arc::clone(&self.mirror_walker);
        let mut visited = 0;
        for entry in walker.walk(directory, WalkOrder::PostOrder) {
            self.sync.check_shutdown(PHASE_RECONCILE)?;
            let entry = entry?;
            visited += 1;
            self.sync.progress(visited, &entry.relative_path);

            if entry.is_dir() {
                if !self.source_dirs.contains(&entry.relative_path) {
                    self.remove_dir_unless_excluded(&entry)?;
                }
            } else if !self.source_files.contains(&entry.relative_path) {
                self.dispose(&entry.relative_path)?;
            }
        }
        Ok(())
    }

    /// Remove a stale mirror directory, or keep it with a warning when all
    /// that is left inside are excluded entries.
    fn remove_dir_unless_excluded(&mut self, entry: &DirEntry) -> Result<(), SyncError> {
        let relative = &entry.relative_path;
        match remove_stale_dir(&self.layout, relative) {
            Ok(()) => {
                self.summary.dirs_removed += 1;
                Ok(())
            }
            Err(SyncError::DirectoryNotEmpty(path)) => {
                if !self.holds_only_excluded(relative, &path)? {
                    return Err(SyncError::DirectoryNotEmpty(path));
                }
                log::warn!(
                    "Keeping {}, it is no longer in the source but holds excluded files.",
                    relative
                );
                self.retained_dirs.insert(relative.clone());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn holds_only_excluded(&self, relative: &str, path: &Path) -> Result<bool, SyncError> {
        for child in fs::read_dir(path).map_err(SyncError::io(path))? {
            let child = child.map_err(SyncError::io(path))?;
            let Some(name) = child.file_name().to_str().map(str::to_string) else {
                return Ok(false);
            };
            let child_relative = format!("{relative}/{name}");
            if !self.mirror_walker.is_excluded(&child_relative)
                && !self.retained_dirs.contains(&child_relative)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn dispose(&mut self, relative: &str) -> Result<(), SyncError> {
        match dispose_stale_file(&mut self.cache, &self.layout, relative)? {
            StaleDisposition::Deduplicated { .. } => self.summary.files_deduplicated += 1,
            StaleDisposition::Archived { size, .. } => {
                self.summary.files_archived += 1;
                self.summary.bytes_archived += size;
            }
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<(), SyncError> {
        self.sync.phase_start(PHASE_COMPACT);
        let stats = self.cache.compact()?;
        log::debug!(
            "Hash cache holds {} record(s) after compaction",
            stats.written
        );
        self.sync.phase_end(PHASE_COMPACT);
        Ok(())
    }
}
