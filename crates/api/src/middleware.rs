//! Request-level middleware.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Log one line per request with its status and latency.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let res = next.run(req).await;

    let status = res.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), elapsed_ms, "request failed");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), elapsed_ms, "request handled");
    }
    res
}
