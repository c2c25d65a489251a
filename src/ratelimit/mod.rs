//! Per-endpoint request rate limiting
//!
//! Sliding-window counter over a trailing one-hour interval. A sliding window
//! avoids the burst-at-boundary artifact of fixed buckets; pruning happens lazily
//! on every read and write so no background timer is needed.

use crate::clock::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Default request budget per endpoint key per window
pub const DEFAULT_MAX_REQUESTS: u32 = 12;
/// Default sliding window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Sliding-window request counter keyed by logical endpoint
pub struct SlidingWindowLimiter {
    windows: HashMap<String, VecDeque<i64>>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }

    pub fn with_limits(clock: Arc<dyn Clock>, max_requests: u32, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_requests,
            window,
            clock,
        }
    }

    /// Drop timestamps that have aged out of the trailing window
    fn prune(&mut self, key: &str) {
        let cutoff = self.clock.now_ms() - self.window.as_millis() as i64;
        if let Some(window) = self.windows.get_mut(key) {
            while window.front().is_some_and(|&ts| ts <= cutoff) {
                window.pop_front();
            }
            if window.is_empty() {
                self.windows.remove(key);
            }
        }
    }

    fn window_count(&mut self, key: &str) -> u32 {
        self.prune(key);
        self.windows.get(key).map_or(0, |w| w.len() as u32)
    }

    /// Whether the endpoint still has budget in the trailing window
    pub fn can_make_request(&mut self, key: &str) -> bool {
        self.window_count(key) < self.max_requests
    }

    /// Record one dispatched request at the current time
    ///
    /// Callers must check `can_make_request` first and only record requests that
    /// were actually dispatched; the limiter itself never blocks or queues.
    pub fn record_request(&mut self, key: &str) {
        self.prune(key);
        let now = self.clock.now_ms();
        self.windows.entry(key.to_string()).or_default().push_back(now);
    }

    /// Remaining budget for the endpoint, never negative
    pub fn remaining_requests(&mut self, key: &str) -> u32 {
        self.max_requests.saturating_sub(self.window_count(key))
    }

    /// Zero when under the limit, otherwise time until the oldest in-window
    /// request ages out
    pub fn time_until_next_request(&mut self, key: &str) -> Duration {
        if self.can_make_request(key) {
            return Duration::ZERO;
        }

        let oldest = match self.windows.get(key).and_then(|w| w.front()) {
            Some(&ts) => ts,
            None => return Duration::ZERO,
        };

        let expires_at = oldest + self.window.as_millis() as i64;
        let wait_ms = (expires_at - self.clock.now_ms()).max(0);
        Duration::from_millis(wait_ms as u64)
    }

    /// Forget one endpoint's window, or all of them
    pub fn reset(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.windows.remove(key);
            }
            None => self.windows.clear(),
        }
    }
}
