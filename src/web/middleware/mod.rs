//! # Web API Middleware
//!
//! - [`request_id`] - uuid per request, echoed as `x-request-id`
//! - [`logging`] - `serving`/`done` request logs
//! - [`auth`] - `Authorization` header requirement for protected routes

pub mod auth;
pub mod logging;
pub mod request_id;

use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Requests running past `request_timeout` are answered with 408
pub fn create_timeout_layer(request_timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::new(request_timeout)
}
