//! # Fibonacci Backoff
//!
//! Progressive requeue delay for autoscalers whose reconcile keeps failing.
//! It grows more slowly than exponential backoff and is capped, so an
//! autoscaler whose workload is never claimed by a policy keeps being retried
//! at a bounded rate instead of hot-looping.
//!
//! With a 5s minimum and a 300s maximum the sequence is
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s, 300s, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting from the minimum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff in seconds
    prev_seconds: u64,
    /// Current backoff in seconds
    current_seconds: u64,
    /// Maximum backoff in seconds
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with minimum and maximum values in seconds
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        let min_seconds = min_seconds.max(1);
        Self {
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds: max_seconds.max(min_seconds),
        }
    }

    /// Get the next backoff in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;

        let next = self.prev_seconds.saturating_add(self.current_seconds);
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);

        result
    }

    /// Get the next backoff as a `Duration` and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }
}
