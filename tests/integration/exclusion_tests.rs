use super::support::Fixture;
use std::fs;

#[test]
fn test_excluded_files_are_not_copied() {
    let fx = Fixture::new();
    fx.write("keep.txt", "k");
    fx.write("scratch.tmp", "t");
    fx.write("sub/also.tmp", "t");

    let summary = fx.sync_excluding(&["*.tmp"]);

    assert_eq!(summary.files_up_to_date, 1);
    assert!(fx.mirror("keep.txt").is_file());
    assert!(!fx.mirror("scratch.tmp").exists());
    // `*` crosses directory separators
    assert!(!fx.mirror("sub/also.tmp").exists());
    assert!(fx.mirror("sub").is_dir());
}

#[test]
fn test_excluded_directory_is_not_descended() {
    let fx = Fixture::new();
    fx.write("node_modules/pkg/index.js", "js");
    fx.write("src/main.rs", "rs");

    let summary = fx.sync_excluding(&["node_modules"]);

    assert_eq!(summary.dirs_up_to_date, 1);
    assert!(!fx.mirror("node_modules").exists());
    assert!(fx.mirror("src/main.rs").is_file());
}

#[test]
fn test_pattern_matches_relative_path_not_name() {
    let fx = Fixture::new();
    fx.write("cache", "top-level file");
    fx.write("app/cache", "nested file");

    fx.sync_excluding(&["cache"]);

    assert!(!fx.mirror("cache").exists());
    assert!(fx.mirror("app/cache").is_file());
}

#[test]
fn test_excluded_mirror_files_are_never_archived() {
    let fx = Fixture::new();
    fx.write("debug.log", "log lines");
    fx.write("data.txt", "data");
    fx.sync();
    assert!(fx.mirror("debug.log").is_file());

    let summary = fx.sync_excluding(&["*.log"]);

    assert_eq!(summary.files_archived, 0);
    assert!(fx.mirror("debug.log").is_file());
    assert!(!fx.archive("debug.log").exists());
}

#[test]
fn test_brace_and_class_patterns() {
    let fx = Fixture::new();
    fx.write("a.bak", "1");
    fx.write("b.swp", "2");
    fx.write("c1.txt", "3");
    fx.write("cx.txt", "4");

    fx.sync_excluding(&["*.{bak,swp}", "c[0-9].txt"]);

    let mut mirrored: Vec<String> = fs::read_dir(fx.layout().mirror)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    mirrored.sort();
    assert_eq!(mirrored, vec!["cx.txt"]);
}

#[test]
fn test_invalid_pattern_is_rejected() {
    use rustmirror::mirror::{SyncError, Synchronizer};
    use rustmirror::scanner::ScanError;

    let fx = Fixture::new();
    let err = Synchronizer::new(fx.options().with_exclude(vec!["[unclosed".to_string()]))
        .run()
        .unwrap_err();
    assert!(matches!(err, SyncError::Scan(ScanError::InvalidPattern { .. })));
}

#[test]
fn test_removed_directory_holding_excluded_files_is_kept() {
    let fx = Fixture::new();
    fx.write("d/x.tmp", "scratch");
    fx.write("d/sub/y.tmp", "more scratch");
    fx.write("d/keep.txt", "keep");
    fx.sync();

    fx.remove("d");
    let summary = fx.sync_excluding(&["*.tmp"]);

    assert_eq!(summary.files_archived, 1);
    assert_eq!(summary.dirs_removed, 0);
    assert!(fx.archive("d/keep.txt").is_file());
    assert!(fx.mirror("d/x.tmp").is_file());
    assert!(fx.mirror("d/sub/y.tmp").is_file());

    // Still fine on the next run
    let summary = fx.sync_excluding(&["*.tmp"]);
    assert_eq!(summary.files_archived, 0);

    // Without the exclusion the leftovers are archived and the tree goes away
    let summary = fx.sync();
    assert_eq!(summary.files_archived, 2);
    assert_eq!(summary.dirs_removed, 2);
    assert!(!fx.mirror("d").exists());
}
