//! Resilience patterns for calls against a rate-limited remote API.
//!
//! - **Retry**: bounded exponential backoff, honouring server-provided delays
//!   such as `Retry-After`
//! - **Rate limiting**: a single minimum inter-call interval shared by every
//!   caller of one remote portal

pub mod rate_limiter;
pub mod retry;

pub use rate_limiter::MinIntervalLimiter;
pub use retry::{
    policies::ClassifiedRetry, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
