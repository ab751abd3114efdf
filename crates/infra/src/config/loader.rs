//! Configuration loader
//!
//! Loads application configuration from a file, then lets environment
//! variables override the portal tokens.
//!
//! ## Loading Strategy
//! 1. Loads `.env` from the working directory (if present)
//! 2. Reads the explicit `--config` path, or looks for `portalsync.toml` /
//!    `portalsync.json`
//! 3. Falls back to defaults when no file exists
//! 4. Applies environment overrides and validates the result
//!
//! ## Environment Variables
//! - `PORTALSYNC_SOURCE_TOKEN`: source portal private-app token
//! - `PORTALSYNC_DESTINATION_TOKEN`: destination portal private-app token
//! - `PORTALSYNC_LOG_JSON`: emit JSON logs (true/false)

use std::path::{Path, PathBuf};

use portalsync_domain::{AppConfig, MigrateError, Result};

use crate::errors::InfraError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "portalsync.toml";
/// Overrides `source.token`.
pub const SOURCE_TOKEN_ENV: &str = "PORTALSYNC_SOURCE_TOKEN";
/// Overrides `destination.token`.
pub const DESTINATION_TOKEN_ENV: &str = "PORTALSYNC_DESTINATION_TOKEN";
/// Overrides `logging.json` when set to a boolean.
pub const LOG_JSON_ENV: &str = "PORTALSYNC_LOG_JSON";

/// Delays below this regularly trip the vendor's burst limit.
const LOW_RATE_LIMIT_DELAY_MS: u64 = 100;

/// Load and validate configuration
///
/// # Errors
/// Returns `MigrateError::Config` if:
/// - An explicit path does not exist
/// - File format is invalid
/// - Tokens are missing or malformed after environment overrides
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!(error = %err, "config.dotenv_unreadable");
        }
    }

    let mut config = match path {
        Some(path) => load_from_file(path)?,
        None => match discover_config_path() {
            Some(found) => load_from_file(&found)?,
            None => {
                tracing::info!("config.no_file_found_using_defaults");
                AppConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    warn_on_aggressive_settings(&config);
    Ok(config)
}

/// Load configuration from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `MigrateError::Config` if the file is missing or malformed.
pub fn load_from_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(MigrateError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "config.loading_file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| MigrateError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MigrateError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(MigrateError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Apply environment overrides through `lookup` (normally `std::env::var`).
///
/// Empty values are ignored so an unset-but-exported variable does not wipe
/// a token from the file.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(token) = non_empty(SOURCE_TOKEN_ENV) {
        config.source.token = token;
    }
    if let Some(token) = non_empty(DESTINATION_TOKEN_ENV) {
        config.destination.token = token;
    }
    if let Some(flag) = non_empty(LOG_JSON_ENV) {
        config.logging.json = parse_bool(&flag, config.logging.json);
    }
}

/// Search the working directory and the executable directory for a config file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(DEFAULT_CONFIG_FILE));
        candidates.push(cwd.join("portalsync.json"));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(DEFAULT_CONFIG_FILE));
            candidates.push(exe_dir.join("portalsync.json"));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn warn_on_aggressive_settings(config: &AppConfig) {
    if config.migration.rate_limit_delay_ms < LOW_RATE_LIMIT_DELAY_MS {
        tracing::warn!(
            rate_limit_delay_ms = config.migration.rate_limit_delay_ms,
            "config.rate_limit_delay_low"
        );
    }
    if config.migration.max_retries == 0 {
        tracing::warn!("config.retries_disabled");
    }
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(raw: &str, default: bool) -> bool {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
