//! # Fibonacci Backoff
//!
//! Progressive retry delay for failed reconcile passes. Grows more slowly than
//! exponential backoff so a component stuck on a transient cluster condition
//! (e.g. deployments still rolling out) is retried often enough to converge
//! quickly once the condition clears.
//!
//! Sequence with `new(15s, 300s)`: 15s, 15s, 30s, 45s, 75s, 120s, 195s, 300s (max).
//!
//! ```rust
//! use pipelines_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_secs(15), Duration::from_secs(300));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(15));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and never exceeding `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_secs = min.as_secs().max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max.as_secs().max(min_secs),
        }
    }

    /// Get the next delay in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence after a successful pass
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(15), Duration::from_secs(300))
    }
}
