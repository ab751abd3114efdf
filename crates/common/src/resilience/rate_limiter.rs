//! Minimum-interval rate limiting.
//!
//! A [`MinIntervalLimiter`] serialises access to one remote portal: every
//! caller awaits [`MinIntervalLimiter::acquire`] before issuing a request,
//! and consecutive acquisitions are spaced at least `interval` apart.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum delay between consecutive calls.
#[derive(Debug)]
pub struct MinIntervalLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl MinIntervalLimiter {
    /// A limiter spacing calls at least `interval` apart.
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_call: Mutex::new(None) }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next call is allowed, then claim the slot.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// behind each other instead of all firing once the interval elapses.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + self.interval;
            let now = Instant::now();
            if ready_at > now {
                trace!(wait_ms = (ready_at - now).as_millis() as u64, "rate_limiter.waiting");
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

impl Default for MinIntervalLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}
