//! In-memory window store and the fixed-window admission algorithm.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Instant;
use tracing::trace;

use super::limiter::LimitConfig;
use super::window::{Decision, RateLimitEntry};

/// Mapping from client key to that client's current window.
///
/// Check-and-increment for a key runs under the key's shard lock, and
/// sweeping takes the same locks, so an entry being opened or bumped is
/// never observed half-updated by either path.
pub struct WindowStore {
    entries: DashMap<String, RateLimitEntry>,
    config: LimitConfig,
}

impl WindowStore {
    /// Create an empty store.
    pub fn new(config: LimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// The limits shared by every key in this store.
    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    /// Decide whether the request from `key` at `now` is admitted.
    ///
    /// A missing or expired window is replaced by a fresh one holding this
    /// request. Inside an open window the count is bumped while below the
    /// limit; at the limit the request is denied and the count left as is.
    pub fn admit(&self, key: &str, now: Instant) -> Decision {
        let window = self.config.window;
        let max_requests = self.config.max_requests;

        match self.entries.entry(key.to_owned()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::open(now, window));
                trace!(key, "Opened window");
                Decision::Allow
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::open(now, window);
                    trace!(key, "Window expired, reopened");
                    Decision::Allow
                } else if entry.count < max_requests {
                    entry.count += 1;
                    trace!(key, count = entry.count, "Counted request");
                    Decision::Allow
                } else {
                    Decision::Deny {
                        retry_after_secs: entry.retry_after_secs(now),
                    }
                }
            }
        }
    }

    /// Remove every entry whose window has ended by `now`.
    ///
    /// Returns the number of entries evicted. Keys inserted while the sweep
    /// runs do not affect the count.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Snapshot of the entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
