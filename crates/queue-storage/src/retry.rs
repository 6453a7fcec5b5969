//! Retry policy for transient storage service failures.

use crate::error::QueueStorageError;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff applied by the clients around each request.
///
/// Only errors reporting [`QueueStorageError::is_transient`] are retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound of any single delay, jitter included
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,

    /// Spread delays by ±25%
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(800),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Deterministic delays, mainly for tests
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delay to wait before retry number `attempt`
    ///
    /// Attempt 0 is the initial request and never waits. The result never
    /// exceeds `max_delay`, with or without jitter.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let mut delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        if self.use_jitter {
            delay_ms *= rand::thread_rng().gen_range(0.75..=1.25);
        }

        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    /// Check if the failed attempt (0-indexed) should be retried
    pub fn should_retry(&self, attempt: u32, error: &QueueStorageError) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
