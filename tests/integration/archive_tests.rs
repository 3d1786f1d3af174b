use super::support::Fixture;
use std::fs;

#[test]
fn test_renamed_file_is_deduplicated_not_archived() {
    let fx = Fixture::new();
    fx.write("a/b.txt", "hello");
    fx.sync();

    fs::rename(fx.src("a/b.txt"), fx.src("a/c.txt")).unwrap();
    let summary = fx.sync();

    assert_eq!(summary.files_updated, 1);
    assert_eq!(summary.files_deduplicated, 1);
    assert_eq!(summary.files_archived, 0);
    assert!(!fx.mirror("a/b.txt").exists());
    assert_eq!(fs::read_to_string(fx.mirror("a/c.txt")).unwrap(), "hello");
    assert!(!fx.archive("a/b.txt").exists());

    let cache = fx.cache();
    assert!(cache.get("a/b.txt").is_none());
    assert_eq!(cache.get("a/c.txt").unwrap().digest, fx.digest("hello"));
}

#[test]
fn test_deleted_file_is_archived() {
    let fx = Fixture::new();
    fx.write("x.txt", "unique content");
    fx.write("keep.txt", "stays");
    fx.sync();

    fx.remove("x.txt");
    let summary = fx.sync();

    assert_eq!(summary.files_archived, 1);
    assert_eq!(summary.bytes_archived, 14);
    assert_eq!(summary.files_deduplicated, 0);
    assert!(!fx.mirror("x.txt").exists());
    assert_eq!(fs::read_to_string(fx.archive("x.txt")).unwrap(), "unique content");

    let cache = fx.cache();
    assert!(cache.get("x.txt").is_none());
    assert!(cache.get("keep.txt").is_some());
}

#[test]
fn test_deleted_directory_is_archived_and_removed() {
    let fx = Fixture::new();
    fx.write("old/nested/one.txt", "1");
    fx.write("old/two.txt", "2");
    fx.write("new.txt", "n");
    fx.sync();

    fx.remove("old");
    let summary = fx.sync();

    assert_eq!(summary.files_archived, 2);
    assert_eq!(summary.dirs_removed, 2);
    assert!(!fx.mirror("old").exists());
    assert!(fx.archive("old/nested/one.txt").is_file());
    assert!(fx.archive("old/two.txt").is_file());
    assert_eq!(summary.dirs_up_to_date, 0);
}

#[test]
fn test_deleted_copy_of_surviving_file_is_deduplicated() {
    let fx = Fixture::new();
    fx.write("original.jpg", "pixels");
    fx.write("backup/copy.jpg", "pixels");
    fx.sync();

    fx.remove("backup");
    let summary = fx.sync();

    assert_eq!(summary.files_deduplicated, 1);
    assert_eq!(summary.files_archived, 0);
    assert!(fx.mirror("original.jpg").is_file());
    assert!(!fx.layout().archive.exists());
}

#[test]
fn test_deleting_all_copies_keeps_one_in_archive() {
    let fx = Fixture::new();
    fx.write("a.txt", "same");
    fx.write("b.txt", "same");
    fx.sync();

    fx.remove("a.txt");
    fx.remove("b.txt");
    let summary = fx.sync();

    // a.txt goes first and still sees b.txt; b.txt is then the last copy
    assert_eq!(summary.files_deduplicated, 1);
    assert_eq!(summary.files_archived, 1);
    assert!(!fx.archive("a.txt").exists());
    assert_eq!(fs::read_to_string(fx.archive("b.txt")).unwrap(), "same");
    assert!(fx.cache().is_empty());
}

#[test]
fn test_archive_replaces_older_version() {
    let fx = Fixture::new();
    fx.write("doc.txt", "version one");
    fx.sync();
    fx.remove("doc.txt");
    fx.sync();

    fx.write("doc.txt", "version two!");
    fx.sync();
    fx.remove("doc.txt");
    let summary = fx.sync();

    assert_eq!(summary.files_archived, 1);
    assert_eq!(fs::read_to_string(fx.archive("doc.txt")).unwrap(), "version two!");
}

#[test]
fn test_archived_file_then_directory_with_same_name() {
    let fx = Fixture::new();
    fx.write("node", "was a file");
    fx.sync();

    fx.remove("node");
    fx.write("node/inner.txt", "inner");
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 1);
    assert!(fx.archive("node").is_file());

    fx.remove("node");
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 1);
    assert_eq!(fs::read_to_string(fx.archive("node/inner.txt")).unwrap(), "inner");
    assert_eq!(fs::read_to_string(fx.archive("node~1")).unwrap(), "was a file");

    // Nothing left to trip over
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 0);
}

#[test]
fn test_archived_directory_then_file_with_same_name() {
    let fx = Fixture::new();
    fx.write("node/inner.txt", "inner");
    fx.sync();

    fx.remove("node");
    fx.write("node", "now a file");
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 1);
    assert!(fx.archive("node/inner.txt").is_file());

    fx.remove("node");
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 1);
    assert_eq!(fs::read_to_string(fx.archive("node")).unwrap(), "now a file");
    assert_eq!(fs::read_to_string(fx.archive("node~1/inner.txt")).unwrap(), "inner");
}
