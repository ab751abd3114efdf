//! Shared building blocks for the portalsync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error classification
//! - `runtime`: async resilience primitives (retry executor, rate limiter)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "foundation")]
pub use error::{ErrorClassification, ErrorScope};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, ClassifiedRetry, MinIntervalLimiter, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryPolicy,
};
