//! Admission middleware for axum routers.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::AdmissionError;
use crate::ratelimit::{ClientKey, Decision, RateLimiterBackend};

/// JSON body of a rejected request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });

        match self {
            AdmissionError::AddressUndeterminable => (StatusCode::BAD_REQUEST, body).into_response(),
            AdmissionError::RateLimitExceeded { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
        }
    }
}

/// Admit or reject a request before it reaches the inner handlers.
///
/// The client key comes from [`ConnectInfo`], so the router must be served
/// with `into_make_service_with_connect_info::<SocketAddr>()` (or layered
/// with `MockConnectInfo`). Without it every request is rejected with 400.
pub async fn enforce<R>(
    State(limiter): State<Arc<R>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response
where
    R: RateLimiterBackend + 'static,
{
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    let key = match ClientKey::from_peer(peer) {
        Ok(key) => key,
        Err(rejection) => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                "Rejecting request without a peer address"
            );
            return rejection.into_response();
        }
    };

    match limiter.admit(&key, Instant::now()).await {
        Decision::Allow => {
            debug!(client = %key, path = %request.uri().path(), "Request admitted");
            next.run(request).await
        }
        Decision::Deny { retry_after_secs } => {
            debug!(
                client = %key,
                path = %request.uri().path(),
                retry_after_secs,
                "Request rate limited"
            );
            AdmissionError::RateLimitExceeded { retry_after_secs }.into_response()
        }
    }
}

/// Put every route of `router` behind the admission check.
pub fn with_admission<R, S>(router: Router<S>, limiter: Arc<R>) -> Router<S>
where
    R: RateLimiterBackend + 'static,
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(limiter, enforce::<R>))
}
