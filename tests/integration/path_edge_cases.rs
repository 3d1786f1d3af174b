use super::support::Fixture;
use std::fs;

#[test]
fn test_unicode_names() {
    let fx = Fixture::new();
    fx.write("фото/café ☕.txt", "espresso");
    fx.write("日本語.md", "nihongo");

    let summary = fx.sync();

    assert_eq!(summary.files_updated, 2);
    assert!(fx.mirror("фото/café ☕.txt").is_file());
    assert!(fx.cache().get("日本語.md").is_some());
}

#[test]
fn test_empty_files_are_mirrored() {
    let fx = Fixture::new();
    fx.write("empty1", "");
    fx.write("empty2", "");
    fx.sync();

    assert_eq!(fs::metadata(fx.mirror("empty1")).unwrap().len(), 0);
    assert_eq!(fx.cache().get("empty1").unwrap().size, 0);

    // Empty files share a digest, so removing one is a dedup
    fx.remove("empty1");
    let summary = fx.sync();
    assert_eq!(summary.files_deduplicated, 1);
}

#[test]
fn test_deep_nesting() {
    let fx = Fixture::new();
    let deep = (0..30).map(|i| format!("d{i}")).collect::<Vec<_>>().join("/");
    fx.write(&format!("{deep}/leaf.txt"), "leaf");

    let summary = fx.sync();

    assert_eq!(summary.dirs_up_to_date, 30);
    assert!(fx.mirror(&format!("{deep}/leaf.txt")).is_file());

    fx.remove("d0");
    let summary = fx.sync();
    assert_eq!(summary.dirs_removed, 30);
    assert!(fx.archive(&format!("{deep}/leaf.txt")).is_file());
}

#[test]
fn test_large_file_spans_copy_blocks() {
    let fx = Fixture::new();
    let content = "0123456789abcdef".repeat(1024 * 1024);
    fx.write("big.bin", &content);

    let summary = fx.sync();

    assert_eq!(summary.bytes_copied, content.len() as u64);
    assert_eq!(fx.cache().get("big.bin").unwrap().digest, fx.digest(&content));
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_skipped() {
    let fx = Fixture::new();
    fx.write("real.txt", "real");
    std::os::unix::fs::symlink(fx.src("real.txt"), fx.src("link.txt")).unwrap();
    std::os::unix::fs::symlink(fx.source.path(), fx.src("loop")).unwrap();

    let summary = fx.sync();

    assert_eq!(summary.files_up_to_date, 1);
    assert!(fs::symlink_metadata(fx.mirror("link.txt")).is_err());
    assert!(fs::symlink_metadata(fx.mirror("loop")).is_err());
}

#[cfg(unix)]
#[test]
fn test_newline_in_name_is_skipped() {
    let fx = Fixture::new();
    fx.write("fine.txt", "ok");
    fx.write("bad\nname.txt", "unrepresentable");

    let summary = fx.sync();

    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_updated, 1);
    assert_eq!(summary.files_up_to_date, 2);
    assert!(!fx.mirror("bad\nname.txt").exists());
    assert_eq!(fx.cache().len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    fx.write("ok.txt", "ok");
    let locked = fx.write("locked.txt", "secret");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        // Running with privileges that ignore permission bits
        return;
    }

    let summary = fx.sync();

    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_updated, 1);
    assert_eq!(summary.files_up_to_date, 2);
    assert!(!fx.mirror("locked.txt").exists());
    assert!(!fx.layout().staging.exists());
}
