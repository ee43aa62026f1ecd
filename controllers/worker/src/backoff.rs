//! # Fibonacci Backoff
//!
//! Requeue delays for workers whose last generation pass failed. The delay
//! grows along the Fibonacci sequence (min, min, 2*min, 3*min, 5*min, ...)
//! and is capped at a maximum. A successful pass discards the backoff of its
//! worker.

use std::time::Duration;

/// Default first delay after a failed pass
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(30);

/// Default upper bound for the delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10 * 60);

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    max: Duration,
    prev: Duration,
    current: Duration,
    failures: u32,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            max,
            prev: Duration::ZERO,
            current: min,
            failures: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = self.prev.saturating_add(self.current);

        self.prev = self.current;
        self.current = next.min(self.max);
        self.failures = self.failures.saturating_add(1);

        delay
    }

    /// Consecutive failures recorded
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}
