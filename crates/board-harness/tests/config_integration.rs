//! Loading configuration files from disk.

use std::io::Write;

use board_harness::config::load_config;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[api]
base_url = "http://localhost:9000/"
board_id = "uXjVOfjkE2s="
token = "secret"
page_size = 25
max_concurrency = 4

[server]
bind = "0.0.0.0:8080"

[snapshot]
max_items = 200
history_capacity = 5
default_depth = 2

[logging]
filter = "board_harness=debug"
"#,
    );
    let cfg = load_config(file.path()).unwrap();
    assert_eq!(cfg.api.board_id.as_deref(), Some("uXjVOfjkE2s="));
    assert_eq!(cfg.api.page_size, 25);
    assert_eq!(cfg.api.resolve_token().unwrap(), "secret");
    assert_eq!(cfg.server.bind, "0.0.0.0:8080");
    assert_eq!(cfg.snapshot.max_items, 200);
    assert_eq!(cfg.snapshot.default_depth, 2);
    assert_eq!(cfg.logging.filter, "board_harness=debug");
}

#[test]
fn test_example_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config/board.example.toml");
    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.api.base_url, "https://api.miro.com");
}

#[test]
fn test_missing_file_names_path() {
    let err = load_config(std::path::Path::new("/nonexistent/board.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/board.toml"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_config("[api]\npage_size = 500\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("page_size"));
}
