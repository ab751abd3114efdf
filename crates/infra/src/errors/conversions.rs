//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use portalsync_domain::MigrateError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MigrateError);

impl From<InfraError> for MigrateError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MigrateError> for InfraError {
    fn from(value: MigrateError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → MigrateError */
/* -------------------------------------------------------------------------- */

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(MigrateError::Storage(format!("I/O failure ({:?}): {value}", value.kind())))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / toml → MigrateError */
/* -------------------------------------------------------------------------- */

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(MigrateError::Storage(format!("invalid JSON document: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(MigrateError::Config(format!("Invalid TOML format: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MigrateError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(MigrateError::Config(format!("invalid HTTP request: {value}")));
        }

        if value.is_timeout() {
            return InfraError(MigrateError::Transient("HTTP request timed out".into()));
        }

        if value.is_connect() {
            return InfraError(MigrateError::Transient("HTTP connection failure".into()));
        }

        if let Some(status) = value.status() {
            let message = format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("unknown status")
            );
            return InfraError(match status.as_u16() {
                401 | 403 => MigrateError::Auth(message),
                404 => MigrateError::NotFound(message),
                409 => MigrateError::Conflict(message),
                429 | 500..=599 => MigrateError::Transient(message),
                _ => MigrateError::Validation(message),
            });
        }

        InfraError(MigrateError::Transient(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
