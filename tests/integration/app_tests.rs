use clap::Parser;
use rustmirror::cli::Cli;
use rustmirror::error::{ExitCode, StructuredError};
use rustmirror::run_app;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct App {
    _root: TempDir,
    source: PathBuf,
    target: PathBuf,
    config: PathBuf,
}

impl App {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        let target = root.path().join("target");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&target).unwrap();

        let config = root.path().join("scopes.toml");
        fs::write(
            &config,
            format!(
                "[scopes.photos]\nsource = {:?}\ntarget = {:?}\nexclude = [\"*.tmp\"]\nalgorithm = \"sha1\"\n",
                source.display().to_string(),
                target.display().to_string()
            ),
        )
        .unwrap();

        Self {
            _root: root,
            source,
            target,
            config,
        }
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        let config = self.config.display().to_string();
        let mut argv = vec!["rustmirror", "-q", "--config", config.as_str()];
        argv.extend_from_slice(args);
        run_app(Cli::try_parse_from(argv).unwrap())
    }
}

fn exit_code(result: anyhow::Result<ExitCode>) -> i32 {
    match result {
        Ok(code) => code.as_i32(),
        Err(err) => ExitCode::for_error(&err).as_i32(),
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    fs::write(root.join(relative), content).unwrap();
}

#[test]
fn test_init_then_sync() {
    let app = App::new();
    write(&app.source, "photo.jpg", "pixels");
    write(&app.source, "edit.tmp", "scratch");

    assert_eq!(app.run(&["init", "photos"]).unwrap(), ExitCode::Success);
    assert!(app.target.join("rustmirror.toml").is_file());

    assert_eq!(app.run(&["sync", "photos"]).unwrap(), ExitCode::Success);
    assert!(app.target.join("mirror/photo.jpg").is_file());
    assert!(!app.target.join("mirror/edit.tmp").exists());
    // The scope's algorithm was bound at init
    assert!(app.target.join("sha1.txt").is_file());
}

#[test]
fn test_init_algorithm_override() {
    let app = App::new();
    app.run(&["init", "photos", "--algorithm", "blake3"]).unwrap();
    app.run(&["sync", "photos"]).unwrap();
    assert!(app.target.join("blake3.txt").is_file());
}

#[test]
fn test_sync_extra_exclude() {
    let app = App::new();
    write(&app.source, "keep.txt", "k");
    write(&app.source, "skip.bak", "b");
    app.run(&["init", "photos"]).unwrap();

    app.run(&["sync", "photos", "--exclude", "*.bak"]).unwrap();
    assert!(app.target.join("mirror/keep.txt").is_file());
    assert!(!app.target.join("mirror/skip.bak").exists());
}

#[test]
fn test_exit_codes() {
    let app = App::new();

    assert_eq!(exit_code(app.run(&["sync", "fotos"])), 2);
    assert_eq!(exit_code(app.run(&["sync", "photos"])), 4);

    write(&app.target, "stray", "x");
    assert_eq!(exit_code(app.run(&["init", "photos"])), 4);
    fs::remove_file(app.target.join("stray")).unwrap();

    app.run(&["init", "photos"]).unwrap();
    fs::write(app.target.join("sha1.txt"), "garbage\n").unwrap();
    assert_eq!(exit_code(app.run(&["sync", "photos"])), 100);
}

#[test]
fn test_missing_source_exit_code() {
    let app = App::new();
    app.run(&["init", "photos"]).unwrap();
    fs::remove_dir(&app.source).unwrap();

    assert_eq!(exit_code(app.run(&["sync", "photos"])), 3);
}

#[test]
fn test_unknown_scope_message_has_suggestion() {
    let app = App::new();
    let err = app.run(&["sync", "fotos"]).unwrap_err();
    let structured = StructuredError::new(&err, ExitCode::for_error(&err));

    assert_eq!(structured.code, "RM002");
    assert!(structured.message.contains("did you mean 'photos'"));
}

#[test]
fn test_missing_config_file() {
    let cli = Cli::try_parse_from([
        "rustmirror",
        "-q",
        "--config",
        "/definitely/not/here/scopes.toml",
        "scopes",
    ])
    .unwrap();
    let err = run_app(cli).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
}

#[test]
fn test_list_scopes() {
    let app = App::new();
    assert_eq!(app.run(&["scopes"]).unwrap(), ExitCode::Success);
}
