//! # Exponential Backoff
//!
//! Retry pacing for failed reconcile passes: 1s doubling up to a 5000s
//! ceiling, tracked per object so an error on one ManagedEndpoint never
//! slows down another. The fixed 30s drift poll is separate from this and
//! is handled by the requeue interval in the driver.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Default minimum backoff in seconds.
pub const MIN_BACKOFF_SECS: u64 = 1;
/// Default backoff ceiling in seconds.
pub const MAX_BACKOFF_SECS: u64 = 5000;

/// Exponential backoff calculator.
///
/// Each call doubles the previous delay, capped at the maximum.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `min_secs`, doubling up to `max_secs`.
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence.
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        self.current_secs = std::cmp::min(self.current_secs.saturating_mul(2), self.max_secs);
        result
    }

    /// Get the next backoff as a `Duration` and advance the sequence.
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state.
    pub fn reset(&mut self) {
        self.current_secs = self.min_secs;
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(MIN_BACKOFF_SECS, MAX_BACKOFF_SECS)
    }
}

/// Per-object backoff state, keyed by "namespace/name".
#[derive(Debug, Default)]
pub struct BackoffTracker {
    entries: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl BackoffTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next delay for this key, advancing its sequence.
    pub fn next_delay(&self, key: &str) -> Duration {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(key.to_string())
            .or_default()
            .next_backoff()
    }

    /// Forget the key's backoff state after a successful pass.
    pub fn reset(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_one_second() {
        let mut backoff = ExponentialBackoff::new(1, 5000);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
        assert_eq!(backoff.next_backoff_seconds(), 4);
        assert_eq!(backoff.next_backoff_seconds(), 8);
        assert_eq!(backoff.next_backoff_seconds(), 16);
    }

    #[test]
    fn test_backoff_caps_at_ceiling() {
        let mut backoff = ExponentialBackoff::new(1, 5000);
        let mut last = 0;
        for _ in 0..20 {
            last = backoff.next_backoff_seconds();
        }
        assert_eq!(last, 5000);
        // stays at the cap
        assert_eq!(backoff.next_backoff_seconds(), 5000);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = ExponentialBackoff::new(1, 5000);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 1);
    }

    #[test]
    fn test_tracker_is_per_key() {
        let tracker = BackoffTracker::new();
        assert_eq!(tracker.next_delay("default/a"), Duration::from_secs(1));
        assert_eq!(tracker.next_delay("default/a"), Duration::from_secs(2));
        // a different object starts fresh
        assert_eq!(tracker.next_delay("default/b"), Duration::from_secs(1));

        tracker.reset("default/a");
        assert_eq!(tracker.next_delay("default/a"), Duration::from_secs(1));
    }
}
