//! Bounded retry with exponential backoff.

use std::time::Duration;

/// Retry budget for transient dependency failures.
///
/// Applies only to `Unavailable`-class failures; deterministic outcomes
/// (not-found, insufficient stock, conflict) are never retried, since
/// retrying would not change them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each subsequent retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// A policy that never retries (single attempt).
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Returns the backoff delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}
