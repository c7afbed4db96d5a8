//! Rate limiter trait for abstracting the window store behind the HTTP layer.

use async_trait::async_trait;
use std::time::Instant;

use super::client::ClientKey;
use super::window::Decision;

/// Trait for rate limiter implementations.
///
/// The in-process [`RateLimiter`](super::RateLimiter) implements this; a store
/// shared between instances would slot in here behind the same contract.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Check and count one request from `key` at `now`.
    async fn admit(&self, key: &ClientKey, now: Instant) -> Decision;
}
