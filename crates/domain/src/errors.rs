//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for portalsync
///
/// Variants follow the migration error taxonomy: transient failures are
/// retried at the call site, validation rejections are per-record, schema
/// errors are scoped to one object type, and `Auth`/`Config` end the run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MigrateError {
    /// Credentials rejected; ends the run.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Network, 5xx or rate limit failure that outlived its retries.
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// The destination refused one record or entity.
    #[error("Validation rejected: {0}")]
    Validation(String),

    /// The entity does not exist; a successful outcome for deletions.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The entity already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A schema could not be read or created; scoped to one object type.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Missing or invalid configuration; ends the run.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reports could not be read or written.
    #[error("Report storage error: {0}")]
    Storage(String),

    /// Another process holds the run lock on the reports directory.
    #[error("Another portalsync run is active (PID {pid}); wait for it to finish")]
    RunInProgress {
        /// Process id recorded in the lock file.
        pid: u32,
    },

    /// Operator input that cannot be acted on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A bug or an unexpected response shape.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrateError {
    /// Errors that end the whole run (bad credentials, broken configuration).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Config(_))
    }

    /// Network, 5xx and rate-limit failures that survived the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The entity was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The run lock is held by another process.
    pub fn is_run_in_progress(&self) -> bool {
        matches!(self, Self::RunInProgress { .. })
    }

    /// Duplicate creates ("already exists") reported by the remote side.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type alias for portalsync operations
pub type Result<T> = std::result::Result<T, MigrateError>;
