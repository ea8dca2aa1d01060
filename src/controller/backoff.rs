//! # Exponential Backoff
//!
//! Backoff for watch stream failures. Each consecutive failure doubles the
//! delay, starting at `start` and capped at `max`; a successfully delivered
//! event resets it.
//!
//! ## Usage
//!
//! ```rust
//! use nsync_controller::controller::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(1));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(2));
//! assert_eq!(backoff.next_delay(), Duration::from_secs(4));
//! assert_eq!(backoff.failures(), 3);
//! ```

use std::time::Duration;

/// Exponential backoff calculator that also counts consecutive failures
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    start: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `start` and never exceeding `max`.
    ///
    /// A `max` below `start` is raised to `start`.
    #[must_use]
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            start,
            max: max.max(start),
            current: start,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        delay
    }

    /// Consecutive failures since the last reset
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Reset after a success
    pub fn reset(&mut self) {
        self.current = self.start;
        self.failures = 0;
    }
}
