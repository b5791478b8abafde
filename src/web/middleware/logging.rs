//! # Request Logging Middleware
//!
//! Logs `serving` before and `done` after every request. Runs inside the `request` span opened by
//! the request id middleware, so both lines carry the request id.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::info;

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    info!(method = %method, uri = %uri, "serving");
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "done"
    );
    response
}
