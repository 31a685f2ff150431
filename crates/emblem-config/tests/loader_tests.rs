//! Tests for loading configuration files.

use emblem_config::{ConfigError, ConfigLoader, EmblemConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_empty_file_gives_defaults() {
    let config = ConfigLoader::load_from_str("").unwrap();
    assert_eq!(config, EmblemConfig::default());
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config = ConfigLoader::load_from_str(
        r#"
[cache]
max_entries = 5000

[daemon]
socket_path = "/run/emblem/test.sock"
"#,
    )
    .unwrap();

    assert_eq!(config.cache.max_entries, 5000);
    assert_eq!(config.daemon.socket_path, Some(PathBuf::from("/run/emblem/test.sock")));
    assert_eq!(config.daemon.event_capacity, 1024);
    assert_eq!(config.vcs.program, "svn");
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = ConfigLoader::load_from_str("[cache]\nmax_entrys = 10\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {:?}", err);

    let err = ConfigLoader::load_from_str("[metrics]\nenabled = true\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got {:?}", err);
}

#[test]
fn test_invalid_values_are_rejected_after_parsing() {
    let err = ConfigLoader::load_from_str("[cache]\nmax_entries = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got {:?}", err);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[watch]
metadata_dir = "_svn"
transaction_markers = ["wc.db"]

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.watch.metadata_dir, "_svn");
    assert_eq!(config.watch.transaction_markers, vec!["wc.db"]);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_file_is_an_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_default_path_is_under_emblem_dir() {
    let path = ConfigLoader::default_path();
    assert!(path.ends_with("emblem/config.toml"));
}
