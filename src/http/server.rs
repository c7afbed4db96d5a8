//! HTTP server implementation.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::admission::with_admission;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::{RateLimiter, RateLimiterBackend};

/// HTTP server that puts a router behind the rate limiter.
pub struct HttpServer<R: RateLimiterBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<R>,
}

impl HttpServer<RateLimiter> {
    /// Create a new HTTP server with the in-process rate limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { addr, rate_limiter }
    }
}

impl<R: RateLimiterBackend + 'static> HttpServer<R> {
    /// Create a new HTTP server with any rate limiter backend.
    pub fn with_backend(addr: SocketAddr, rate_limiter: Arc<R>) -> Self {
        Self { addr, rate_limiter }
    }

    /// The address this server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wrap `routes` with admission control and request tracing.
    pub fn app(&self, routes: Router) -> Router {
        with_admission(routes, self.rate_limiter.clone()).layer(TraceLayer::new_for_http())
    }

    /// Bind and serve `routes` until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, routes: Router, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            TurnstileError::Io(e)
        })?;
        self.serve_on(listener, routes, signal).await
    }

    /// Serve `routes` on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, routes: Router, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.app(routes);
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Starting HTTP server with graceful shutdown");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })
    }
}

/// Routes served by the standalone binary.
pub fn default_routes() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
