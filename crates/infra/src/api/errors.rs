//! API-specific error types
//!
//! Every failed call against a portal is classified once, here, so the retry
//! loop and the migrators agree on what is transient and what is final.

use std::time::Duration;

use portalsync_common::{ErrorClassification, ErrorScope, RetryError};
use portalsync_domain::MigrateError;
use reqwest::StatusCode;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403) - end the run
    Authentication,
    /// Rate limiting errors (429) - retry after the requested delay
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx) - non-retryable, usually per record
    Client,
    /// Network/connection errors and timeouts - retryable
    Network,
    /// Configuration and decoding errors - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// 401/403: the token was rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// 429, with the delay the portal asked for.
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        /// Status and response body.
        message: String,
        /// Parsed `Retry-After`, in whole seconds.
        retry_after: Option<Duration>,
    },

    /// 5xx.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Status and response body.
        message: String,
    },

    /// Any other 4xx: the request itself was rejected.
    #[error("Client error ({status}): {message}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Status and response body.
        message: String,
    },

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 409, e.g. a property or association that already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection-level failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured timeout.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Bad client setup, e.g. an invalid base URL.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status and its body to an error.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("status {status}")
        } else {
            format!("status {status}: {}", body.trim())
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Auth(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimit { message, retry_after },
            _ if status.is_server_error() => Self::Server { status: status.as_u16(), message },
            _ if body.to_lowercase().contains("already exists") => Self::Conflict(message),
            _ => Self::Client { status: status.as_u16(), message },
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::RateLimit { .. } => ApiErrorCategory::RateLimit,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::Client { .. } | Self::NotFound(_) | Self::Conflict(_) => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) | Self::Decode(_) => ApiErrorCategory::Config,
        }
    }

    /// True for a 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
        )
    }

    fn scope(&self) -> ErrorScope {
        if matches!(self, Self::Decode(_)) {
            return ErrorScope::Record;
        }
        match self.category() {
            ApiErrorCategory::Authentication | ApiErrorCategory::Config => ErrorScope::Run,
            ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network => {
                ErrorScope::Call
            }
            ApiErrorCategory::Client => ErrorScope::Record,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<ApiError> for MigrateError {
    fn from(err: ApiError) -> Self {
        let message = err.to_string();
        match err {
            ApiError::Auth(_) => MigrateError::Auth(message),
            ApiError::RateLimit { .. }
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout(_) => MigrateError::Transient(message),
            ApiError::Client { .. } => MigrateError::Validation(message),
            ApiError::NotFound(_) => MigrateError::NotFound(message),
            ApiError::Conflict(_) => MigrateError::Conflict(message),
            ApiError::Config(_) => MigrateError::Config(message),
            ApiError::Decode(_) => MigrateError::Internal(message),
        }
    }
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        err.into_source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_statuses_to_categories() {
        let auth = ApiError::from_status(StatusCode::UNAUTHORIZED, None, "");
        assert_eq!(auth.category(), ApiErrorCategory::Authentication);

        let limited =
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), "");
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));

        let server = ApiError::from_status(StatusCode::BAD_GATEWAY, None, "upstream");
        assert!(matches!(server, ApiError::Server { status: 502, .. }));

        let missing = ApiError::from_status(StatusCode::NOT_FOUND, None, "");
        assert!(missing.is_not_found());
    }

    #[test]
    fn already_exists_body_is_a_conflict() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"message":"Property named 'tier' already exists."}"#,
        );
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(ApiError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(ApiError::Server { status: 503, message: String::new() }.is_retryable());
        assert!(!ApiError::Auth("expired".into()).is_retryable());
        assert!(!ApiError::Client { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::Conflict("exists".into()).is_retryable());
    }

    #[test]
    fn only_auth_and_config_abort_the_run() {
        assert_eq!(ApiError::Auth("expired".into()).scope(), ErrorScope::Run);
        assert!(ApiError::Config("bad url".into()).aborts_run());
        assert_eq!(ApiError::NotFound("gone".into()).scope(), ErrorScope::Record);
        assert_eq!(ApiError::Timeout(Duration::from_secs(1)).scope(), ErrorScope::Call);
    }

    #[test]
    fn converts_into_migrate_error_taxonomy() {
        assert!(matches!(MigrateError::from(ApiError::Auth("x".into())), MigrateError::Auth(_)));
        assert!(matches!(
            MigrateError::from(ApiError::Network("x".into())),
            MigrateError::Transient(_)
        ));
        assert!(matches!(
            MigrateError::from(ApiError::Client { status: 400, message: "bad email".into() }),
            MigrateError::Validation(msg) if msg.contains("bad email")
        ));
        assert!(matches!(
            MigrateError::from(ApiError::Conflict("x".into())),
            MigrateError::Conflict(_)
        ));
    }
}
