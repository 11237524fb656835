//! Per-client submission rate limiting
//!
//! This module tracks how many submissions each client made recently:
//! - Sliding-window counting of attempts per client identifier
//! - Lazy pruning of expired timestamps on every check
//! - Periodic sweeping of clients whose window went entirely stale
//!
//! The limiter counts attempts, not successes. A submission that later fails
//! validation still occupies a slot in the client's window.

use log::{debug, info};
use std::collections::{HashMap, VecDeque};

/// Default length of the sliding window in milliseconds
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Default number of attempts a client may make within one window
pub const DEFAULT_MAX_ATTEMPTS: usize = 6;

/// Recent attempt timestamps for a single client
///
/// Timestamps are kept in arrival order, so the oldest entry is always at
/// the front and pruning only ever pops from the front.
#[derive(Debug, Default)]
struct AttemptWindow {
    attempts: VecDeque<u64>,
}

impl AttemptWindow {
    /// Drops every timestamp whose age has reached the window length
    fn prune(&mut self, now: u64, window_ms: u64) {
        while let Some(&oldest) = self.attempts.front() {
            if now.saturating_sub(oldest) >= window_ms {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns true if no timestamp in the window is still live at `now`
    fn is_stale(&self, now: u64, window_ms: u64) -> bool {
        self.attempts
            .back()
            .map_or(true, |&newest| now.saturating_sub(newest) >= window_ms)
    }
}

/// Sliding-window attempt counter keyed by client identifier
///
/// Each call to [`RateLimiter::check_and_record`] recomputes the number of
/// attempts in the trailing window from scratch. Callers must serialize
/// access per limiter; the `&mut self` receiver enforces that statically
/// when the limiter is owned by a single event loop.
#[derive(Debug)]
pub struct RateLimiter {
    /// Attempt history indexed by client identifier
    windows: HashMap<String, AttemptWindow>,
    /// Length of the sliding window in milliseconds
    window_ms: u64,
    /// Attempts allowed inside one window
    max_attempts: usize,
}

impl RateLimiter {
    /// Creates an empty limiter with the given window length and capacity
    pub fn new(window_ms: u64, max_attempts: usize) -> Self {
        Self {
            windows: HashMap::new(),
            window_ms,
            max_attempts,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Admits or rejects a new attempt from `client_id` at time `now`
    ///
    /// Prunes the client's expired timestamps, then refuses the attempt if
    /// the window is already full. An admitted attempt is recorded; a refused
    /// one is not, so hammering a full window does not extend the lockout.
    pub fn check_and_record(&mut self, client_id: &str, now: u64) -> bool {
        let window = self.windows.entry(client_id.to_string()).or_default();
        window.prune(now, self.window_ms);

        if window.attempts.len() >= self.max_attempts {
            debug!(
                "Client {} over limit ({} attempts in {}ms)",
                client_id,
                window.attempts.len(),
                self.window_ms
            );
            return false;
        }

        window.attempts.push_back(now);
        true
    }

    /// Number of attempts currently counted against a client
    pub fn attempts_in_window(&self, client_id: &str, now: u64) -> usize {
        self.windows.get(client_id).map_or(0, |window| {
            window
                .attempts
                .iter()
                .filter(|&&t| now.saturating_sub(t) < self.window_ms)
                .count()
        })
    }

    /// Removes clients whose entire window has expired
    ///
    /// Without sweeping, a long-running server keeps one entry per distinct
    /// client forever. Returns the number of evicted clients.
    pub fn sweep(&mut self, now: u64) -> usize {
        let before = self.windows.len();
        let window_ms = self.window_ms;
        self.windows
            .retain(|_, window| !window.is_stale(now, window_ms));

        let evicted = before - self.windows.len();
        if evicted > 0 {
            info!(
                "Swept {} stale rate limit entries, {} remaining",
                evicted,
                self.windows.len()
            );
        }
        evicted
    }

    /// Forgets every tracked client
    pub fn reset(&mut self) {
        self.windows.clear();
    }

    /// Returns the number of tracked clients
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Returns true if no client is being tracked
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.window_ms(), 60_000);
        assert_eq!(limiter.max_attempts(), 6);
        assert!(limiter.is_empty());
        assert_eq!(limiter.len(), 0);
    }

    #[test]
    fn test_seventh_attempt_rejected() {
        let mut limiter = RateLimiter::new(60_000, 6);
        let start = 1_000_000;

        for i in 0..6 {
            assert!(limiter.check_and_record("10.0.0.1", start + i * 1_000));
        }

        assert!(!limiter.check_and_record("10.0.0.1", start + 10_000));
        assert_eq!(limiter.attempts_in_window("10.0.0.1", start + 10_000), 6);
    }

    #[test]
    fn test_admitted_again_after_window() {
        let mut limiter = RateLimiter::new(60_000, 6);
        let start = 1_000_000;

        for i in 0..6 {
            assert!(limiter.check_and_record("10.0.0.1", start + i * 1_000));
        }
        assert!(!limiter.check_and_record("10.0.0.1", start + 59_999));

        // First attempt has aged out exactly one window later
        assert!(limiter.check_and_record("10.0.0.1", start + 60_000));
        // The second one has not
        assert!(!limiter.check_and_record("10.0.0.1", start + 60_500));
        assert!(limiter.check_and_record("10.0.0.1", start + 61_000));
    }

    #[test]
    fn test_rejected_attempt_not_recorded() {
        let mut limiter = RateLimiter::new(1_000, 1);

        assert!(limiter.check_and_record("c", 0));
        for t in [100, 200, 900, 999] {
            assert!(!limiter.check_and_record("c", t));
        }

        // Only the admitted attempt at t=0 counts, so the lockout ends at 1000
        assert!(limiter.check_and_record("c", 1_000));
    }

    #[test]
    fn test_clients_are_independent() {
        let mut limiter = RateLimiter::new(60_000, 2);

        assert!(limiter.check_and_record("a", 0));
        assert!(limiter.check_and_record("a", 1));
        assert!(!limiter.check_and_record("a", 2));

        assert!(limiter.check_and_record("b", 2));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut limiter = RateLimiter::new(60_000, 0);
        assert!(!limiter.check_and_record("a", 0));
        assert_eq!(limiter.attempts_in_window("a", 0), 0);
    }

    #[test]
    fn test_sweep_evicts_only_stale_clients() {
        let mut limiter = RateLimiter::new(60_000, 6);

        limiter.check_and_record("old", 0);
        limiter.check_and_record("recent", 50_000);

        assert_eq!(limiter.sweep(70_000), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.attempts_in_window("recent", 70_000), 1);
        assert_eq!(limiter.attempts_in_window("old", 70_000), 0);

        assert_eq!(limiter.sweep(110_000), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_sweep_keeps_partially_live_window() {
        let mut limiter = RateLimiter::new(60_000, 6);

        limiter.check_and_record("c", 0);
        limiter.check_and_record("c", 30_000);

        assert_eq!(limiter.sweep(65_000), 0);
        assert_eq!(limiter.attempts_in_window("c", 65_000), 1);
    }

    #[test]
    fn test_reset() {
        let mut limiter = RateLimiter::new(60_000, 1);
        limiter.check_and_record("a", 0);
        assert!(!limiter.check_and_record("a", 1));

        limiter.reset();
        assert!(limiter.is_empty());
        assert!(limiter.check_and_record("a", 2));
    }
}
