//! Per-client fixed-window request counting.
//!
//! Each client key owns one [`ClientWindow`]. A window opens on the client's first request,
//! counts requests until it is `window` old, and then resets on the next request.
//! Windows live in a sharded [`DashMap`], so updates for one key are serialized by the
//! shard lock while unrelated clients proceed in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counting state for a single client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub window_start: Instant,
    pub count: u64,
}

impl ClientWindow {
    fn open(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 1,
        }
    }

    /// Age of the window at `now`, clamped to zero if `now` precedes the start.
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow {
        limit: u64,
        remaining: u64,
        /// Time until the current window closes.
        reset_after: Duration,
    },
    Reject {
        limit: u64,
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }
}

/// In-memory per-client rate limiter.
///
/// Cloning is cheap; all clones share the same windows.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, Instant};
/// use tracker_gateway::domain::rate_limiter::RateLimiter;
///
/// let limiter = RateLimiter::new(2, Duration::from_secs(60));
/// let now = Instant::now();
///
/// assert!(limiter.check("10.0.0.1", now).is_allowed());
/// assert!(limiter.check("10.0.0.1", now).is_allowed());
/// assert!(!limiter.check("10.0.0.1", now).is_allowed());
/// assert!(limiter.check("10.0.0.2", now).is_allowed());
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    max_requests: u64,
    window: Duration,
    windows: DashMap<String, ClientWindow>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window`. The ceiling is at least 1.
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                max_requests: max_requests.max(1),
                window,
                windows: DashMap::new(),
            }),
        }
    }

    pub fn max_requests(&self) -> u64 {
        self.inner.max_requests
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Counts one request from `client_key` at `now`.
    ///
    /// A rejected request does not advance the counter, so the count saturates at
    /// `max_requests` until the window expires.
    pub fn check(&self, client_key: &str, now: Instant) -> Decision {
        let limit = self.inner.max_requests;
        let window = self.inner.window;

        // Existing clients take the get_mut path without allocating a key.
        let mut entry = match self.inner.windows.get_mut(client_key) {
            Some(entry) => entry,
            None => self
                .inner
                .windows
                .entry(client_key.to_string())
                .or_insert_with(|| ClientWindow {
                    window_start: now,
                    count: 0,
                }),
        };
        let state = entry.value_mut();

        let age = state.age(now);
        if state.count == 0 || age >= window {
            *state = ClientWindow::open(now);
            return Decision::Allow {
                limit,
                remaining: limit - 1,
                reset_after: window,
            };
        }

        let reset_after = window - age;

        if state.count >= limit {
            return Decision::Reject {
                limit,
                retry_after: reset_after,
            };
        }

        state.count += 1;
        Decision::Allow {
            limit,
            remaining: limit - state.count,
            reset_after,
        }
    }

    /// Current window for `client_key`, if one exists.
    pub fn window_for(&self, client_key: &str) -> Option<ClientWindow> {
        self.inner.windows.get(client_key).map(|w| *w)
    }

    /// Number of tracked client windows.
    pub fn tracked_clients(&self) -> usize {
        self.inner.windows.len()
    }

    /// Evicts windows that have expired at `now`. Returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let window = self.inner.window;
        let before = self.inner.windows.len();
        self.inner
            .windows
            .retain(|_, state| state.age(now) < window);
        before.saturating_sub(self.inner.windows.len())
    }
}
