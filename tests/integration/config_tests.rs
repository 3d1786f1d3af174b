use rustmirror::config::{Config, ConfigError, CONFIG_FILE_NAME};
use rustmirror::scanner::HashAlgorithm;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &config_path,
        r#"
[scopes.music]
source = "/home/me/Music"
target = "/backup/music"
exclude = ["*.m3u", "Podcasts"]
algorithm = "blake3"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&config_path)).unwrap();
    let music = config.scope("music").unwrap();

    assert_eq!(music.source, PathBuf::from("/home/me/Music"));
    assert_eq!(music.target, PathBuf::from("/backup/music"));
    assert_eq!(music.exclude, vec!["*.m3u", "Podcasts"]);
    assert_eq!(music.algorithm, HashAlgorithm::Blake3);
}

#[test]
fn test_config_missing_default_file_is_empty() {
    let temp_dir = tempdir().unwrap();
    let config = Config::load_from(&temp_dir.path().join(CONFIG_FILE_NAME)).unwrap();
    assert!(config.scopes.is_empty());
}

#[test]
fn test_config_invalid_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(&config_path, "[scopes.broken\nsource =").unwrap();

    let err = Config::load(Some(&config_path)).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_config_unknown_algorithm() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
    fs::write(
        &config_path,
        "[scopes.x]\nsource = \"/a\"\ntarget = \"/b\"\nalgorithm = \"crc32\"\n",
    )
    .unwrap();

    assert!(Config::load(Some(&config_path)).is_err());
}

#[test]
fn test_default_path_file_name() {
    if let Ok(path) = Config::default_path() {
        assert!(path.ends_with(CONFIG_FILE_NAME));
    }
}
