//! Configuration structures
//!
//! Loaded by the infra config loader from TOML/JSON and environment
//! overrides; validated here so every entry point applies the same rules.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_RETRY_AFTER_SECS, DEFAULT_RATE_LIMIT_DELAY_MS, DEFAULT_REPORTS_DIRECTORY,
    DEFAULT_REQUEST_TIMEOUT_SECS, MIN_TOKEN_LENGTH, PRIVATE_APP_TOKEN_PREFIX, SEARCH_PAGE_SIZE,
    TOKEN_PLACEHOLDERS,
};
use crate::{MigrateError, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Portal records are read from.
    #[serde(default)]
    pub source: PortalConfig,
    /// Portal records are written to and rolled back in.
    #[serde(default)]
    pub destination: PortalConfig,
    /// Transport and batching settings.
    #[serde(default)]
    pub migration: MigrationSettings,
    /// Log level, format and file output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Where reports go.
    #[serde(default)]
    pub output: OutputConfig,
    /// Extra field filter rules keyed by object type (`contact`, `custom:pets`).
    #[serde(default)]
    pub field_filters: BTreeMap<String, FieldFilterOverrides>,
}

impl AppConfig {
    /// Validate credentials and numeric settings.
    pub fn validate(&self) -> Result<()> {
        validate_token("source", &self.source.token)?;
        validate_token("destination", &self.destination.token)?;
        if self.source.token == self.destination.token {
            return Err(MigrateError::Config(
                "source and destination tokens must differ".to_string(),
            ));
        }
        self.migration.validate()
    }
}

/// Connection settings for one portal
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Private app token; never logged in full.
    #[serde(default)]
    pub token: String,
    /// API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self { token: String::new(), base_url: default_base_url() }
    }
}

impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("token", &redact(&self.token))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn redact(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }
    let visible: String = token.chars().take(4).collect();
    format!("{visible}…")
}

/// Transport and batching settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Records per batch, at most one search page.
    pub batch_size: usize,
    /// Minimum spacing between calls to one portal.
    pub rate_limit_delay_ms: u64,
    /// Attempts per call, including the first.
    pub max_retries: u32,
    /// First backoff delay.
    pub base_backoff_ms: u64,
    /// Ceiling for `Retry-After` delays.
    pub max_retry_after_secs: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Cap applied to `migrate` when no `--limit` is given.
    pub default_limit: Option<usize>,
    /// Contacts without an email cannot be deduplicated; skip them.
    pub skip_contacts_without_email: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            max_retry_after_secs: DEFAULT_MAX_RETRY_AFTER_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_limit: None,
            skip_contacts_without_email: true,
        }
    }
}

impl MigrationSettings {
    /// Check the numeric bounds.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > SEARCH_PAGE_SIZE {
            return Err(MigrateError::Config(format!(
                "migration.batch_size must be between 1 and {SEARCH_PAGE_SIZE}, got {}",
                self.batch_size
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(MigrateError::Config(
                "migration.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of the compact format.
    pub json: bool,
    /// Also write logs to a file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false, directory: None }
    }
}

/// Report output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding one JSON report per run.
    pub reports_directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { reports_directory: PathBuf::from(DEFAULT_REPORTS_DIRECTORY) }
    }
}

/// Per object type additions to the built-in field filter tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFilterOverrides {
    /// Extra property names to drop.
    pub excluded: Vec<String>,
    /// Names kept even when a built-in rule would drop them.
    pub always_allowed: Vec<String>,
}

/// Check that a token looks like a usable private-app token.
pub fn validate_token(label: &str, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(MigrateError::Config(format!("{label} token is not set")));
    }
    let lowered = token.to_lowercase();
    if TOKEN_PLACEHOLDERS.iter().any(|placeholder| lowered.contains(placeholder)) {
        return Err(MigrateError::Config(format!("{label} token is still a placeholder value")));
    }
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(MigrateError::Config(format!(
            "{label} token is too short ({} characters, expected at least {MIN_TOKEN_LENGTH})",
            token.len()
        )));
    }
    if !token.starts_with(PRIVATE_APP_TOKEN_PREFIX) {
        return Err(MigrateError::Config(format!(
            "{label} token must be a private app token starting with '{PRIVATE_APP_TOKEN_PREFIX}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "pat-na1-11111111-2222-3333-4444-555555555555";
    const DESTINATION: &str = "pat-na1-66666666-7777-8888-9999-000000000000";

    fn config() -> AppConfig {
        AppConfig {
            source: PortalConfig { token: SOURCE.into(), ..PortalConfig::default() },
            destination: PortalConfig { token: DESTINATION.into(), ..PortalConfig::default() },
            ..AppConfig::default()
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_placeholder_short_and_foreign_tokens() {
        assert!(validate_token("source", "").is_err());
        assert!(validate_token("source", "your_production_token_here_please").is_err());
        assert!(validate_token("source", "pat-short").is_err());
        assert!(validate_token("source", "abcdefghijklmnopqrstuvwxyz0123").is_err());
        assert!(validate_token("source", SOURCE).is_ok());
    }

    #[test]
    fn rejects_identical_portals() {
        let mut cfg = config();
        cfg.destination.token = SOURCE.into();
        assert!(matches!(cfg.validate(), Err(MigrateError::Config(msg)) if msg.contains("differ")));
    }

    #[test]
    fn rejects_out_of_range_batch_size() {
        let mut cfg = config();
        cfg.migration.batch_size = 500;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", config().source);
        assert!(!rendered.contains(SOURCE));
        assert!(rendered.contains("pat-"));
    }
}
