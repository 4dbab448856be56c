//! Client-side request budget for the collector API.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Requests the collector accepts per window from one client.
pub const COLLECTOR_MAX_REQUESTS: usize = 100;
/// Length of the collector's rate-limit window.
pub const COLLECTOR_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Sliding-window limiter: at most `max_requests` in any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    sent: Mutex<VecDeque<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(COLLECTOR_MAX_REQUESTS, COLLECTOR_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            sent: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Record a request at `now` if the budget allows it.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let Ok(mut sent) = self.sent.lock() else {
            return false;
        };
        while let Some(oldest) = sent.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                sent.pop_front();
            } else {
                break;
            }
        }
        if sent.len() >= self.max_requests {
            return false;
        }
        sent.push_back(now);
        true
    }

    /// Requests still allowed at `now`.
    pub fn remaining_at(&self, now: Instant) -> usize {
        let Ok(sent) = self.sent.lock() else {
            return 0;
        };
        let live = sent
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count();
        self.max_requests.saturating_sub(live)
    }
}
