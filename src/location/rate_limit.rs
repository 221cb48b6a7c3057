//! Per-caller sliding-window rate limiter.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

pub const DEFAULT_MAX_REQUESTS: usize = 60;
pub const DEFAULT_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct RateLimitWindow {
    requests: Vec<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: HashMap<String, RateLimitWindow>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_requests,
            window,
        }
    }

    /// Record a request for `caller` if it fits in the window.
    ///
    /// Returns `false` (and records nothing) when the caller is over quota.
    pub fn check(&mut self, caller: &str, now: DateTime<Utc>) -> bool {
        let window = self.window;
        let entry = self
            .windows
            .entry(caller.to_string())
            .or_insert_with(|| RateLimitWindow { requests: Vec::new() });

        entry.requests.retain(|t| now - *t < window);

        if entry.requests.len() >= self.max_requests {
            return false;
        }
        entry.requests.push(now);
        true
    }

    /// Requests still available to `caller` at `now`.
    pub fn remaining(&self, caller: &str, now: DateTime<Utc>) -> usize {
        let used = self
            .windows
            .get(caller)
            .map(|w| w.requests.iter().filter(|t| now - **t < self.window).count())
            .unwrap_or(0);
        self.max_requests.saturating_sub(used)
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forget callers whose window holds no live requests.
    pub fn prune_idle(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.windows
            .retain(|_, w| w.requests.iter().any(|t| now - *t < window));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}
