//! Hash cache for mirrored files.
//!
//! This module keeps a content digest and size for every file in the mirror
//! so that a file that vanished from the source can be recognised as a
//! rename (its content still exists elsewhere in the mirror) without
//! rehashing anything.
//!
//! # Architecture
//!
//! The caching system is split into two main components:
//!
//! * [`database`]: The [`HashCache`] store: records, reverse index, journal,
//!   pruning, compaction and crash recovery.
//! * [`entry`]: The [`CacheRecord`] model and the text line codec shared by
//!   all cache files.
//!
//! # Files
//!
//! For a target bound to algorithm `<alg>`:
//!
//! * `<alg>.txt`: compacted base file
//! * `<alg>-update.txt`: append-only journal, one line per copied file
//! * `<alg>-merged.txt`: side file that only exists during compaction
//!
//! # Crash Safety
//!
//! Compaction writes and syncs the side file, then removes the journal, then
//! the base file, then renames the side file into place. At any instant the
//! files on disk hold the full state, and [`HashCache::load`] knows which
//! ones to trust.

pub mod database;
pub mod entry;

pub use database::{CacheError, CacheFiles, CacheResult, CompactStats, HashCache};
pub use entry::{CacheLine, CacheRecord, LineError};
