//! Rate limiting logic and state management.

mod backend;
mod client;
mod janitor;
mod limiter;
mod store;
mod window;

pub use backend::RateLimiterBackend;
pub use client::ClientKey;
pub use janitor::Janitor;
pub use limiter::{LimitConfig, RateLimiter};
pub use store::WindowStore;
pub use window::{Decision, RateLimitEntry};
