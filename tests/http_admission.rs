//! Integration tests for the HTTP admission layer.

use axum::{
    body::{to_bytes, Body},
    extract::{connect_info::MockConnectInfo, ConnectInfo},
    http::{header, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower::ServiceExt;
use turnstile::http::{default_routes, with_admission, ErrorBody, HttpServer};
use turnstile::ratelimit::{LimitConfig, RateLimiter};

fn limiter(max_requests: u64, window_ms: u64) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(LimitConfig::new(max_requests, window_ms).unwrap()))
}

fn app(limiter: Arc<RateLimiter>) -> Router {
    let routes = Router::new().route("/items", get(|| async { "items" }));
    with_admission(routes, limiter)
}

fn request_from(peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    let mut request = Request::builder().uri("/items").body(Body::empty()).unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn error_of(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice::<ErrorBody>(&bytes).unwrap().error
}

#[tokio::test]
async fn test_requests_within_limit_pass_through() {
    let app = app(limiter(3, 60_000));

    for i in 1..=3 {
        let response = app.clone().oneshot(request_from("10.0.0.1:4000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"items");
    }
}

#[tokio::test]
async fn test_request_over_limit_gets_429_with_retry_after() {
    let limiter = limiter(2, 60_000);
    let app = app(limiter.clone());

    for _ in 0..2 {
        let response = app.clone().oneshot(request_from("10.0.0.1:4000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(request_from("10.0.0.1:4001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(
        error_of(response).await,
        "Too many requests. Please try again later."
    );

    // Denied requests are not counted.
    assert_eq!(limiter.counter("10.0.0.1").unwrap().count, 2);
}

#[tokio::test]
async fn test_clients_are_isolated() {
    let app = app(limiter(1, 60_000));

    let first = app.clone().oneshot(request_from("10.0.0.1:4000")).await.unwrap();
    let second = app.clone().oneshot(request_from("10.0.0.1:4000")).await.unwrap();
    let other = app.clone().oneshot(request_from("10.0.0.2:4000")).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_headers_do_not_change_bucket() {
    let app = app(limiter(1, 60_000));

    let mut first = request_from("10.0.0.1:4000");
    first
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.1".parse().unwrap());
    let mut second = request_from("10.0.0.1:4000");
    second
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.2".parse().unwrap());
    second.headers_mut().insert("x-real-ip", "203.0.113.3".parse().unwrap());

    assert_eq!(app.clone().oneshot(first).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.clone().oneshot(second).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_missing_peer_address_is_rejected() {
    let limiter = limiter(5, 60_000);
    let app = app(limiter.clone());

    // An existing entry for some other key must not matter.
    app.clone().oneshot(request_from("10.0.0.1:4000")).await.unwrap();

    for _ in 0..3 {
        let request = Request::builder().uri("/items").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(response).await, "Unable to determine client address.");
    }

    // Fail-closed requests never create a shared bucket.
    assert_eq!(limiter.entry_count(), 1);
}

#[tokio::test]
async fn test_mock_connect_info_layer() {
    let addr: SocketAddr = "[::ffff:192.0.2.10]:5555".parse().unwrap();
    let limiter = limiter(1, 60_000);
    let app = app(limiter.clone()).layer(MockConnectInfo(addr));

    let request = Request::builder().uri("/items").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(limiter.counter("192.0.2.10").is_some());
}

#[tokio::test]
async fn test_concurrent_requests_respect_limit() {
    let app = app(limiter(10, 60_000));

    let responses = futures::future::join_all(
        (0..50).map(|_| app.clone().oneshot(request_from("10.9.9.9:1234"))),
    )
    .await;

    let ok = responses
        .into_iter()
        .map(|r| r.unwrap().status())
        .filter(|status| *status == StatusCode::OK)
        .count();
    assert_eq!(ok, 10);
}

async fn raw_get(addr: SocketAddr, path: &str, forwarded_octet: u8) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nX-Forwarded-For: 198.51.100.{}\r\nConnection: close\r\n\r\n",
        path, forwarded_octet
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn test_server_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let limiter = limiter(2, 60_000);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = HttpServer::new(addr, limiter.clone());
    let handle = tokio::spawn(async move {
        server
            .serve_on(listener, default_routes(), async {
                let _ = stop_rx.await;
            })
            .await
    });

    let first = raw_get(addr, "/health", 1).await;
    assert!(first.starts_with("HTTP/1.1 200"), "got: {}", first);
    assert!(first.contains("healthy"));

    let second = raw_get(addr, "/health", 2).await;
    assert!(second.starts_with("HTTP/1.1 200"), "got: {}", second);

    let third = raw_get(addr, "/health", 3).await;
    assert!(third.starts_with("HTTP/1.1 429"), "got: {}", third);
    assert!(third.to_ascii_lowercase().contains("retry-after:"));

    // Spoofed forwarded addresses differ, but all three share the loopback peer.
    assert_eq!(limiter.entry_count(), 1);
    assert_eq!(limiter.counter("127.0.0.1").unwrap().count, 2);

    stop_tx.send(()).unwrap();
    tokio_test::assert_ok!(handle.await.unwrap());
}
