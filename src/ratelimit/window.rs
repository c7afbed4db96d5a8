//! Fixed-window entry and admission decision types.

use std::time::{Duration, Instant};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// One client's current admission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests admitted in the current window
    pub count: u64,
    /// When the current window ends and a fresh one begins
    pub reset_at: Instant,
}

impl RateLimitEntry {
    /// Open a new window at `now` with the first request already counted.
    pub fn open(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now + window,
        }
    }

    /// Whether the window has ended. The boundary instant itself counts as ended.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_at
    }

    /// Whole seconds until the window resets, rounded up.
    ///
    /// Returns 0 only once the window has ended.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let remaining = self.reset_at.saturating_duration_since(now).as_nanos();
        remaining.div_ceil(NANOS_PER_SEC) as u64
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request is admitted and has been counted
    Allow,
    /// The request is over limit
    Deny {
        /// Seconds the client should wait before retrying
        retry_after_secs: u64,
    },
}

impl Decision {
    /// Returns `true` if the request was admitted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}
