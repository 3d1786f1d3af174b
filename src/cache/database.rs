//! Journaled, text-file backed hash cache.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::entry::{CacheLine, CacheRecord, LineError};
use crate::scanner::HashAlgorithm;

/// Errors raised by the hash cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// A cache or journal line could not be parsed.
    #[error("Corrupt hash cache: {file} line {line_number}: {reason} ({line:?})")]
    Corrupted {
        /// File containing the bad line
        file: PathBuf,
        /// 1-based line number
        line_number: usize,
        /// The raw line
        line: String,
        /// What is wrong with it
        reason: LineError,
    },

    /// The path cannot be written as a single cache line.
    #[error("Path cannot be stored in the hash cache: {0:?}")]
    UnrepresentablePath(String),

    /// A cache file could not be read or written.
    #[error("Hash cache I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove a file, treating "already gone" as success.
fn remove_if_exists(path: &Path) -> CacheResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_error(path)(e)),
    }
}

/// Locations of the cache files for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFiles {
    /// Compacted base file, `<alg>.txt`
    pub base: PathBuf,
    /// Append-only journal, `<alg>-update.txt`
    pub journal: PathBuf,
    /// Compaction side file, `<alg>-merged.txt`
    pub merged: PathBuf,
}

impl CacheFiles {
    /// Cache file names inside `dir` for `algorithm`.
    #[must_use]
    pub fn new(dir: &Path, algorithm: HashAlgorithm) -> Self {
        let stem = algorithm.name();
        Self {
            base: dir.join(format!("{stem}.txt")),
            journal: dir.join(format!("{stem}-update.txt")),
            merged: dir.join(format!("{stem}-merged.txt")),
        }
    }
}

/// Line counts from one compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    /// Lines read from the journal
    pub journal_lines: usize,
    /// Lines read from the old base file
    pub base_lines: usize,
    /// Lines written to the new base file
    pub written: usize,
}

/// Persistent path → (digest, size) index with a digest → paths reverse index.
///
/// The journal is the durability point: every [`record`](Self::record) is
/// appended and synced before the call returns. [`compact`](Self::compact)
/// folds the journal into the base file in an order that always leaves
/// enough on disk for [`load`](Self::load) to rebuild the current state.
#[derive(Debug)]
pub struct HashCache {
    files: CacheFiles,
    algorithm: HashAlgorithm,
    records: HashMap<String, CacheRecord>,
    reverse: HashMap<String, BTreeSet<String>>,
    journal: Option<File>,
}

impl HashCache {
    /// Load the cache stored in `dir` for `algorithm`.
    ///
    /// Finishes or discards an interrupted compaction, drops an unterminated
    /// last journal line left by a kill mid-append, reads the base file, then
    /// replays the journal so that entries appended before a crash are
    /// visible again.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupted`] for any other malformed line and
    /// [`CacheError::Io`] if a file cannot be read.
    pub fn load(dir: &Path, algorithm: HashAlgorithm) -> CacheResult<Self> {
        Self::open(CacheFiles::new(dir, algorithm), algorithm)
    }

    /// Load the cache from explicit file locations.
    ///
    /// # Errors
    ///
    /// See [`HashCache::load`].
    pub fn open(files: CacheFiles, algorithm: HashAlgorithm) -> CacheResult<Self> {
        recover_compaction(&files)?;
        truncate_torn_tail(&files.journal)?;

        let mut cache = Self {
            files,
            algorithm,
            records: HashMap::new(),
            reverse: HashMap::new(),
            journal: None,
        };

        let base = read_lines(&cache.files.base, algorithm)?;
        let journal = read_lines(&cache.files.journal, algorithm)?;
        log::debug!(
            "Loaded hash cache: {} base line(s), {} journal line(s)",
            base.len(),
            journal.len()
        );

        for line in base.into_iter().chain(journal) {
            cache.insert(line.path, line.record);
        }
        Ok(cache)
    }

    /// Digest algorithm of this cache.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Cache file locations.
    #[must_use]
    pub fn files(&self) -> &CacheFiles {
        &self.files
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for a relative path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CacheRecord> {
        self.records.get(path)
    }

    /// Iterate over all records, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheRecord)> {
        self.records.iter().map(|(path, record)| (path.as_str(), record))
    }

    /// Paths currently sharing `digest`, in lexicographic order.
    pub fn paths_with_digest<'a>(&'a self, digest: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.reverse
            .get(digest)
            .into_iter()
            .flat_map(|paths| paths.iter().map(String::as_str))
    }

    /// Other paths with the same digest as `path`, in lexicographic order.
    pub fn duplicates_of<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.records
            .get(path)
            .into_iter()
            .flat_map(move |record| self.paths_with_digest(&record.digest))
            .filter(move |other| *other != path)
    }

    /// Make sure the journal file exists and is open for appending.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the journal cannot be opened.
    pub fn begin_journal(&mut self) -> CacheResult<()> {
        if self.journal.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.files.journal)
                .map_err(io_error(&self.files.journal))?;
            self.journal = Some(file);
        }
        Ok(())
    }

    /// Record a freshly copied file and append it to the journal.
    ///
    /// The journal line is flushed and synced before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnrepresentablePath`] for paths containing a
    /// newline, or [`CacheError::Io`] if the journal append fails.
    pub fn record(&mut self, path: &str, digest: &str, size: u64) -> CacheResult<()> {
        if path.is_empty() || path.contains('\n') {
            return Err(CacheError::UnrepresentablePath(path.to_string()));
        }

        self.begin_journal()?;
        let line = CacheLine::new(path, CacheRecord::new(digest, size));
        let journal_path = &self.files.journal;
        if let Some(journal) = self.journal.as_mut() {
            // One write per line, so a kill can only tear the tail
            let text = format!("{line}\n");
            journal
                .write_all(text.as_bytes())
                .map_err(io_error(journal_path))?;
            journal.flush().map_err(io_error(journal_path))?;
            journal.sync_data().map_err(io_error(journal_path))?;
        }

        self.insert(line.path, line.record);
        Ok(())
    }

    /// Drop the record for `path`, returning it if present.
    pub fn forget(&mut self, path: &str) -> Option<CacheRecord> {
        let record = self.records.remove(path)?;
        if let Some(paths) = self.reverse.get_mut(&record.digest) {
            paths.remove(path);
            if paths.is_empty() {
                self.reverse.remove(&record.digest);
            }
        }
        Some(record)
    }

    /// Drop every record whose path fails `still_exists`.
    ///
    /// Returns the number of records removed.
    pub fn prune<F>(&mut self, mut still_exists: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let dead: Vec<String> = self
            .records
            .keys()
            .filter(|path| !still_exists(path.as_str()))
            .cloned()
            .collect();

        for path in &dead {
            log::trace!("Pruning cache record for {}", path);
            self.forget(path);
        }
        dead.len()
    }

    /// Merge journal and base file into a new base file.
    ///
    /// Journal lines are taken newest first, then base lines; each path is
    /// written once and only if it still has a live record. The side file is
    /// written and synced, then the journal is removed, then the old base
    /// file, and finally the side file is renamed onto the base name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupted`] if the journal or base file holds a
    /// malformed line; nothing on disk is changed in that case.
    pub fn compact(&mut self) -> CacheResult<CompactStats> {
        // The journal's presence marks the side file as incomplete, so it
        // must exist before the side file is created.
        self.begin_journal()?;
        self.journal = None;

        let journal = read_lines(&self.files.journal, self.algorithm)?;
        let base = read_lines(&self.files.base, self.algorithm)?;
        let mut stats = CompactStats {
            journal_lines: journal.len(),
            base_lines: base.len(),
            written: 0,
        };

        let merged = File::create(&self.files.merged).map_err(io_error(&self.files.merged))?;
        let mut writer = BufWriter::new(merged);
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.records.len());

        for line in journal.iter().rev().chain(base.iter()) {
            if self.records.contains_key(&line.path) && seen.insert(line.path.as_str()) {
                writeln!(writer, "{line}").map_err(io_error(&self.files.merged))?;
                stats.written += 1;
            }
        }

        let merged = writer
            .into_inner()
            .map_err(|e| io_error(&self.files.merged)(e.into_error()))?;
        merged.sync_all().map_err(io_error(&self.files.merged))?;
        drop(merged);

        remove_if_exists(&self.files.journal)?;
        remove_if_exists(&self.files.base)?;
        fs::rename(&self.files.merged, &self.files.base).map_err(io_error(&self.files.base))?;
        sync_parent_dir(&self.files.base)?;

        log::debug!(
            "Compacted hash cache: {} journal + {} base line(s) -> {}",
            stats.journal_lines,
            stats.base_lines,
            stats.written
        );
        Ok(stats)
    }

    fn insert(&mut self, path: String, record: CacheRecord) {
        if let Some(previous) = self.records.get(&path) {
            if previous.digest == record.digest {
                self.records.insert(path, record);
                return;
            }
            self.forget(&path);
        }
        self.reverse
            .entry(record.digest.clone())
            .or_default()
            .insert(path.clone());
        self.records.insert(path, record);
    }
}

/// Bring the cache files back to a consistent state after a crash during
/// compaction.
///
/// The journal is only removed once the side file is complete, so a side
/// file next to a journal is partial and is discarded, while a side file
/// without a journal is complete and replaces the base file.
fn recover_compaction(files: &CacheFiles) -> CacheResult<()> {
    if !files.merged.exists() {
        return Ok(());
    }

    if files.journal.exists() {
        log::warn!(
            "Discarding incomplete cache merge {}",
            files.merged.display()
        );
        remove_if_exists(&files.merged)?;
    } else {
        log::warn!(
            "Completing interrupted cache merge {}",
            files.merged.display()
        );
        remove_if_exists(&files.base)?;
        fs::rename(&files.merged, &files.base).map_err(io_error(&files.base))?;
        sync_parent_dir(&files.base)?;
    }
    Ok(())
}

/// Cut an unterminated last line off the journal.
///
/// Every append ends in a newline, so a missing one means the process died
/// mid-write and the fragment was never acknowledged. Returns the number of
/// bytes dropped.
fn truncate_torn_tail(journal: &Path) -> CacheResult<u64> {
    let content = match fs::read(journal) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(io_error(journal)(e)),
    };
    if content.last().is_none_or(|&b| b == b'\n') {
        return Ok(0);
    }

    let keep = content
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |idx| idx + 1);
    let dropped = (content.len() - keep) as u64;
    log::warn!(
        "Dropping {} byte(s) of an unfinished entry at the end of {}: {:?}",
        dropped,
        journal.display(),
        String::from_utf8_lossy(&content[keep..])
    );

    let file = OpenOptions::new()
        .write(true)
        .open(journal)
        .map_err(io_error(journal))?;
    file.set_len(keep as u64).map_err(io_error(journal))?;
    file.sync_all().map_err(io_error(journal))?;
    Ok(dropped)
}

/// Make a rename inside the directory holding `path` durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> CacheResult<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(io_error(dir))
}

/// Directories cannot be opened for syncing here; renames are left to the OS.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> CacheResult<()> {
    Ok(())
}

/// Read and parse every non-blank line of `path`; a missing file is empty.
fn read_lines(path: &Path, algorithm: HashAlgorithm) -> CacheResult<Vec<CacheLine>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(path)(e)),
    };

    content
        .split('\n')
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            CacheLine::parse(line, algorithm).map_err(|reason| CacheError::Corrupted {
                file: path.to_path_buf(),
                line_number: idx + 1,
                line: line.to_string(),
                reason,
            })
        })
        .collect()
}
