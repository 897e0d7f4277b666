use std::path::PathBuf;
use workbench_core::{open_configured_db, ConfigError, CoreConfig};

#[test]
fn load_reads_toml_file_and_keeps_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("workbench.toml");
    std::fs::write(
        &path,
        r#"
db_path = "/var/lib/workbench/db.sqlite3"
media_url = "https://cdn.example.com/media"

[image]
max_side = 1024
"#,
    )
    .unwrap();

    let config = CoreConfig::load(&path).unwrap();
    assert_eq!(config.db_path, PathBuf::from("/var/lib/workbench/db.sqlite3"));
    assert_eq!(config.media_url, "https://cdn.example.com/media");
    assert_eq!(config.image.max_side, 1024);
    assert_eq!(config.image.max_upload_bytes, 10 * 1024 * 1024);
    assert_eq!(config.search.result_cap, 50);
    assert_eq!(config.log_dir, None);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CoreConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn malformed_toml_and_invalid_values_are_rejected() {
    let err = CoreConfig::from_toml_str("media_url = [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let err = CoreConfig::from_toml_str("media_url = \"  \"").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "media_url", .. }));

    let err = CoreConfig::from_toml_str("[search]\nresult_cap = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "search.result_cap", .. }));
}

#[test]
fn configured_db_path_is_opened_and_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("workbench.sqlite3");
    let config_path = dir.path().join("workbench.toml");
    std::fs::write(&config_path, format!("db_path = '{}'\n", db_path.display())).unwrap();

    let config = CoreConfig::load(&config_path).unwrap();
    let conn = open_configured_db(&config).unwrap();

    assert!(db_path.exists());
    let projects: i64 = conn
        .query_row("SELECT COUNT(*) FROM projects;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(projects, 0);
}
