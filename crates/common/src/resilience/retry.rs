//! Generic retry executor with bounded exponential backoff.
//!
//! The executor is generic over the error type; a [`RetryPolicy`] decides
//! per failure whether another attempt is made and how long to wait first.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during retry operations
///
/// Both variants carry the last error so callers can still classify it.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    AttemptsExhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        source: E,
    },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable {
        /// Attempts made.
        attempts: u32,
        /// The error that stopped the loop.
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::AttemptsExhausted { attempts, .. } | Self::NonRetryable { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Consume the retry error and return the last underlying error.
    pub fn into_source(self) -> E {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source, .. } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: `initial_delay * base^attempt`, capped at
    /// `max_delay`
    Exponential {
        /// Delay before the first retry.
        initial_delay: Duration,
        /// Growth factor per attempt.
        base: f64,
        /// Upper bound on any single delay.
        max_delay: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate the delay before retry number `attempt + 1` (zero-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let delay = initial_delay.as_secs_f64() * base.powi(exponent);
                if !delay.is_finite() || delay >= max_delay.as_secs_f64() {
                    *max_delay
                } else {
                    Duration::from_secs_f64(delay)
                }
            }
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Delay schedule between attempts.
    pub backoff: BackoffStrategy,
    /// Upper bound applied to delays requested by [`RetryDecision::RetryAfter`]
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(1),
                base: 2.0,
                max_delay: Duration::from_secs(30),
            },
            max_retry_after: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// Create a new builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts.max(1);
        self
    }

    /// Wait the same `delay` before every retry.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    /// Multiply the delay by `base` per attempt, from `initial_delay` up to `max_delay`.
    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    /// Cap server-requested delays at `cap`.
    pub fn max_retry_after(mut self, cap: Duration) -> Self {
        self.config.max_retry_after = cap;
        self
    }

    /// Finish the configuration.
    pub fn build(self) -> RetryConfig {
        self.config
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            debug!(attempt = attempt_number, max_attempts, "retry.attempt");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "retry.recovered");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    return Err(RetryError::NonRetryable { attempts: attempt_number, source: error });
                }
                RetryDecision::Retry => self.config.backoff.calculate_delay(attempt),
                RetryDecision::RetryAfter(requested) => requested.min(self.config.max_retry_after),
            };

            if attempt_number >= max_attempts {
                warn!(attempts = attempt_number, error = %error, "retry.exhausted");
                return Err(RetryError::AttemptsExhausted { attempts: attempt_number, source: error });
            }

            warn!(attempt = attempt_number, delay_ms = delay.as_millis() as u64, error = %error, "retry.scheduled");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

/// Built-in retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};
    use crate::error::ErrorClassification;

    /// Retries errors that classify themselves as retryable, preferring the
    /// delay the error itself suggests.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ClassifiedRetry;

    impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if !error.is_retryable() {
                return RetryDecision::Stop;
            }
            match error.retry_after() {
                Some(delay) => RetryDecision::RetryAfter(delay),
                None => RetryDecision::Retry,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = BackoffStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            base: 2.0,
            max_delay: Duration::from_secs(5),
        };

        assert_eq!(backoff.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(backoff.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(backoff.calculate_delay(2), Duration::from_secs(4));
        assert_eq!(backoff.calculate_delay(3), Duration::from_secs(5));
        assert_eq!(backoff.calculate_delay(60), Duration::from_secs(5));
    }

    struct StopOnOdd;

    impl RetryPolicy<u32> for StopOnOdd {
        fn should_retry(&self, error: &u32, _attempt: u32) -> RetryDecision {
            if error % 2 == 1 {
                RetryDecision::Stop
            } else {
                RetryDecision::Retry
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_stops_immediately() {
        let executor = RetryExecutor::new(RetryConfig::builder().max_attempts(5).build(), StopOnOdd);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), u32> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(3) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, source: 3 })));
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_exhausts_attempts_and_keeps_source() {
        let executor = RetryExecutor::new(
            RetryConfig::builder().max_attempts(3).fixed_backoff(Duration::from_millis(10)).build(),
            StopOnOdd,
        );
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), u32> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(2) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_source(), 2);
    }
}
