//! Error classification shared by every portalsync error type.
//!
//! Module-specific errors stay concrete (`ApiError`, `MigrateError`, ...) and
//! implement [`ErrorClassification`] so the resilience layer can decide on
//! retries without knowing the concrete type.

use std::fmt;
use std::time::Duration;

/// How far a failure reaches once retries are out of the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorScope {
    /// One remote call; another attempt may succeed.
    Call,
    /// One record or entity; the run moves on to the next.
    Record,
    /// The whole run stops (bad credentials, bad configuration).
    Run,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Record => write!(f, "record"),
            Self::Run => write!(f, "run"),
        }
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Transient failures (timeouts, throttling, 5xx) that may succeed if
    /// attempted again.
    fn is_retryable(&self) -> bool;

    /// Delay the remote side asked for, e.g. a `Retry-After` header.
    fn retry_after(&self) -> Option<Duration>;

    /// How far the failure reaches; defaults to [`ErrorScope::Call`] for
    /// retryable errors and [`ErrorScope::Record`] otherwise.
    fn scope(&self) -> ErrorScope {
        if self.is_retryable() {
            ErrorScope::Call
        } else {
            ErrorScope::Record
        }
    }

    /// Whether the failure stops the whole run.
    fn aborts_run(&self) -> bool {
        self.scope() == ErrorScope::Run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Throttled(Option<Duration>);

    impl ErrorClassification for Throttled {
        fn is_retryable(&self) -> bool {
            true
        }

        fn retry_after(&self) -> Option<Duration> {
            self.0
        }
    }

    struct Rejected;

    impl ErrorClassification for Rejected {
        fn is_retryable(&self) -> bool {
            false
        }

        fn retry_after(&self) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn default_scope_follows_retryability() {
        let throttled = Throttled(Some(Duration::from_secs(2)));
        assert_eq!(throttled.scope(), ErrorScope::Call);
        assert_eq!(throttled.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(Rejected.scope(), ErrorScope::Record);
        assert!(!Rejected.aborts_run());
    }

    #[test]
    fn scopes_widen_in_order() {
        assert!(ErrorScope::Call < ErrorScope::Record);
        assert!(ErrorScope::Record < ErrorScope::Run);
        assert_eq!(ErrorScope::Run.to_string(), "run");
    }
}
