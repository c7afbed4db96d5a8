//! Core rate limiter implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use super::backend::RateLimiterBackend;
use super::client::ClientKey;
use super::janitor::Janitor;
use super::store::WindowStore;
use super::window::{Decision, RateLimitEntry};
use crate::error::{Result, TurnstileError};

/// Limits applied to every client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests admitted per window
    pub max_requests: u64,
    /// Length of one window
    pub window: Duration,
}

impl LimitConfig {
    /// Build a limit, rejecting a zero request cap or a zero-length window.
    pub fn new(max_requests: u64, window_ms: u64) -> Result<Self> {
        if max_requests == 0 {
            return Err(TurnstileError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window_ms == 0 {
            return Err(TurnstileError::Config(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window: Duration::from_millis(window_ms),
        })
    }

    /// How often the janitor sweeps: twice the window length.
    pub fn janitor_interval(&self) -> Duration {
        self.window * 2
    }
}

/// The rate limiter that owns the window store and its janitor.
///
/// This struct is thread-safe and can be shared across multiple tasks.
pub struct RateLimiter {
    store: Arc<WindowStore>,
    janitor: Mutex<Option<Janitor>>,
}

impl RateLimiter {
    /// Create a rate limiter with no background sweep.
    ///
    /// Expired entries are still replaced on their next request, but keys that
    /// never return are only reclaimed by [`RateLimiter::sweep_expired`].
    pub fn new(config: LimitConfig) -> Self {
        Self {
            store: Arc::new(WindowStore::new(config)),
            janitor: Mutex::new(None),
        }
    }

    /// Create a rate limiter and spawn its janitor on the current tokio runtime.
    pub fn start(config: LimitConfig) -> Self {
        let store = Arc::new(WindowStore::new(config));
        let janitor = Janitor::spawn(store.clone(), config.janitor_interval());

        info!(
            max_requests = config.max_requests,
            window_ms = config.window.as_millis() as u64,
            "Rate limiter started"
        );

        Self {
            store,
            janitor: Mutex::new(Some(janitor)),
        }
    }

    /// The configured limits.
    pub fn config(&self) -> &LimitConfig {
        self.store.config()
    }

    /// Check and count a request from `key` at `now`.
    ///
    /// Denials are not logged here; the HTTP layer logs them with the path.
    pub fn admit(&self, key: &str, now: Instant) -> Decision {
        self.store.admit(key, now)
    }

    /// Get the current window for a key.
    ///
    /// Returns `None` if the key has no entry.
    pub fn counter(&self, key: &str) -> Option<RateLimitEntry> {
        self.store.get(key)
    }

    /// Get the number of tracked client keys.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    /// Evict expired entries immediately, returning how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        self.store.sweep_expired(now)
    }

    /// Clear all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Whether a janitor task is currently attached.
    pub fn has_janitor(&self) -> bool {
        self.janitor.lock().is_some()
    }

    /// Stop the janitor and wait for it to finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        let janitor = self.janitor.lock().take();
        if let Some(janitor) = janitor {
            janitor.shutdown().await;
            info!("Rate limiter stopped");
        }
    }
}

#[async_trait]
impl RateLimiterBackend for RateLimiter {
    async fn admit(&self, key: &ClientKey, now: Instant) -> Decision {
        RateLimiter::admit(self, key.as_str(), now)
    }
}
