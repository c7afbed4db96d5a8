//! Turnstile - Per-Client Request Admission
//!
//! This crate caps how many requests a single client may issue within a
//! fixed time window. Clients are identified by their socket peer address,
//! expired windows are reclaimed by a background janitor, and the limiter
//! plugs into any axum router as middleware.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
