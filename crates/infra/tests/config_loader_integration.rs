//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use portalsync_domain::MigrateError;
use portalsync_infra::config;
use tempfile::{Builder, NamedTempFile};

fn write_config(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_load_config_from_toml_file() {
    let file = write_config(
        r#"
[source]
token = "pat-na1-11111111-2222-3333-4444-555555555555"

[destination]
token = "pat-na1-66666666-7777-8888-9999-000000000000"
base_url = "https://sandbox.example.test"

[migration]
rate_limit_delay_ms = 500
default_limit = 25
skip_contacts_without_email = false

[logging]
level = "debug"
json = true

[output]
reports_directory = "/var/lib/portalsync/reports"

[field_filters.contact]
excluded = ["legacy_score"]
always_allowed = ["hs_lead_status"]
"#,
        ".toml",
    );

    let config = config::load_from_file(file.path()).expect("toml config should load");

    assert_eq!(config.destination.base_url, "https://sandbox.example.test");
    assert_eq!(config.source.base_url, "https://api.hubapi.com");
    assert_eq!(config.migration.rate_limit_delay_ms, 500);
    assert_eq!(config.migration.default_limit, Some(25));
    assert!(!config.migration.skip_contacts_without_email);
    assert_eq!(config.migration.max_retries, 3);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert_eq!(config.output.reports_directory.to_str(), Some("/var/lib/portalsync/reports"));
    assert_eq!(config.field_filters["contact"].excluded, vec!["legacy_score".to_string()]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_config_from_json_file() {
    let file = write_config(
        r#"{
            "source": {"token": "pat-na1-11111111-2222-3333-4444-555555555555"},
            "destination": {"token": "pat-na1-66666666-7777-8888-9999-000000000000"},
            "migration": {"batch_size": 25}
        }"#,
        ".json",
    );

    let config = config::load_from_file(file.path()).expect("json config should load");
    assert_eq!(config.migration.batch_size, 25);
    assert_eq!(config.output.reports_directory.to_str(), Some("reports"));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = config::load_from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(MigrateError::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_explicit_path_with_placeholder_token_fails_validation() {
    let file = write_config(
        r#"
[source]
token = "your_production_token_here"

[destination]
token = "pat-na1-66666666-7777-8888-9999-000000000000"
"#,
        ".toml",
    );

    // Token environment variables would mask the placeholder.
    if std::env::var(config::SOURCE_TOKEN_ENV).is_ok() {
        return;
    }

    let result = config::load(Some(file.path()));
    assert!(matches!(result, Err(MigrateError::Config(msg)) if msg.contains("placeholder")));
}
