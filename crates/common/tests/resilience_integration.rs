//! Integration tests for the resilience module
//!
//! Exercises the retry executor with a classified error type, the way the
//! HTTP layer drives it.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use portalsync_common::resilience::{ClassifiedRetry, RetryConfig, RetryError, RetryExecutor};
use portalsync_common::{ErrorClassification, ErrorScope};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct TestError {
    message: String,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl TestError {
    fn transient() -> Self {
        Self { message: "503 service unavailable".into(), retryable: true, retry_after: None }
    }

    fn throttled(secs: u64) -> Self {
        Self {
            message: "429 too many requests".into(),
            retryable: true,
            retry_after: Some(Duration::from_secs(secs)),
        }
    }

    fn rejected() -> Self {
        Self { message: "400 invalid email".into(), retryable: false, retry_after: None }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TestError {}

impl ErrorClassification for TestError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

fn executor(max_attempts: u32) -> RetryExecutor<ClassifiedRetry> {
    RetryExecutor::new(
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .exponential_backoff(Duration::from_secs(1), 2.0, Duration::from_secs(30))
            .max_retry_after(Duration::from_secs(300))
            .build(),
        ClassifiedRetry,
    )
}

#[tokio::test(start_paused = true)]
async fn transient_failures_recover_with_exponential_backoff() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = executor(4)
        .execute(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(TestError::transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s + 2s of backoff before the third attempt
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_is_honoured_and_capped() {
    let calls = AtomicU32::new(0);
    let start = Instant::now();

    let result = executor(2)
        .execute(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(TestError::throttled(900))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(result.is_ok());
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(300));
    assert!(waited < Duration::from_secs(900));
}

#[tokio::test(start_paused = true)]
async fn validation_rejection_is_not_retried() {
    let calls = AtomicU32::new(0);

    let result: Result<(), RetryError<TestError>> = executor(4)
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::rejected()) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(TestError::rejected().scope(), ErrorScope::Record);
    match result {
        Err(RetryError::NonRetryable { source, .. }) => assert!(source.message.contains("400")),
        other => panic!("expected non-retryable error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_last_error() {
    let calls = AtomicU32::new(0);

    let result: Result<(), RetryError<TestError>> = executor(3)
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::transient()) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::AttemptsExhausted { attempts: 3, .. }));
    assert!(err.into_source().is_retryable());
}
