use super::support::Fixture;
use rustmirror::cache::{CacheError, HashCache, LineError};
use rustmirror::mirror::SyncError;
use rustmirror::scanner::HashAlgorithm;
use std::fs;
use std::io::Write;

#[test]
fn test_corrupt_base_file_aborts_run() {
    let fx = Fixture::new();
    fx.write("a.txt", "a");
    fs::write(&fx.cache_files().base, "this is not a cache line\n").unwrap();

    let err = fx.try_sync().unwrap_err();
    assert!(err.is_cache_corruption());
    // Nothing was copied
    assert!(!fx.mirror("a.txt").exists());
}

#[test]
fn test_corrupt_journal_aborts_run() {
    let fx = Fixture::new();
    fs::write(
        &fx.cache_files().journal,
        format!("{} 1 ok.txt\n{} one bad.txt\n", fx.digest("1"), fx.digest("2")),
    )
    .unwrap();

    match fx.try_sync().unwrap_err() {
        SyncError::Cache(CacheError::Corrupted {
            line_number,
            reason,
            ..
        }) => {
            assert_eq!(line_number, 2);
            assert!(matches!(reason, LineError::InvalidSize(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_digest_of_wrong_length_is_corrupt() {
    let fx = Fixture::with_algorithm(HashAlgorithm::Sha1);
    // An md5 digest in a sha1 cache
    fs::write(
        &fx.cache_files().base,
        format!("{} 1 a.txt\n", HashAlgorithm::Md5.hash_bytes(b"a")),
    )
    .unwrap();

    let err = HashCache::load(fx.target.path(), HashAlgorithm::Sha1).unwrap_err();
    assert!(matches!(
        err,
        CacheError::Corrupted {
            reason: LineError::InvalidDigest { .. },
            ..
        }
    ));
}

#[test]
fn test_blank_lines_are_tolerated() {
    let fx = Fixture::new();
    fs::write(
        &fx.cache_files().base,
        format!("\n{} 1 a.txt\n\n", fx.digest("a")),
    )
    .unwrap();

    let cache = HashCache::load(fx.target.path(), fx.algorithm).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_error_message_names_file_and_line() {
    let fx = Fixture::new();
    fs::write(&fx.cache_files().base, "garbage").unwrap();

    let err = fx.try_sync().unwrap_err().to_string();
    assert!(err.contains("md5.txt"), "{err}");
    assert!(err.contains("line 1"), "{err}");
}

#[test]
fn test_unfinished_journal_append_is_dropped() {
    let fx = Fixture::new();
    fx.write("a.txt", "a");
    fx.sync();

    // A kill in the middle of an append leaves a line without its newline
    let journal = fx.cache_files().journal;
    fs::write(&journal, format!("{} 1 a.txt\n", fx.digest("a"))).unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(fx.digest("b")[..10].as_bytes()).unwrap();
    drop(file);

    fx.write("b.txt", "b");
    let summary = fx.sync();
    assert_eq!(summary.files_updated, 1);

    // The next run loads cleanly as well
    let summary = fx.sync();
    assert_eq!(summary.files_updated, 0);
    let cache = fx.cache();
    assert_eq!(cache.get("a.txt").unwrap().digest, fx.digest("a"));
    assert_eq!(cache.get("b.txt").unwrap().digest, fx.digest("b"));
}

#[test]
fn test_malformed_line_before_journal_end_stays_fatal() {
    let fx = Fixture::new();
    fs::write(
        &fx.cache_files().journal,
        format!("{}\n{} 1 ok.txt", &fx.digest("x")[..10], fx.digest("1")),
    )
    .unwrap();

    let err = fx.try_sync().unwrap_err();
    assert!(err.is_cache_corruption());
}
