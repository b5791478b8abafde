//! # Web API Module
//!
//! Axum-based HTTP surface over the [`StatusAggregator`](crate::status::StatusAggregator).
//!
//! - [`routes`] - route table, split into public and protected groups
//! - [`handlers`] - request handlers
//! - [`middleware`] - request id, request logging, authorization
//! - [`state`] - shared handler state
//! - [`errors`] - HTTP error mapping
//! - [`response_types`] - wire shapes

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod response_types;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router.
///
/// Layers, outermost first: tracing, CORS, timeout, request id, request logging. Protected
/// routes additionally pass through the authorization check.
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.request_timeout();

    let protected_routes = routes::protected_routes().layer(axum::middleware::from_fn_with_state(
        app_state.clone(),
        middleware::auth::require_authorization,
    ));

    Router::new()
        .merge(routes::public_routes())
        .merge(protected_routes)
        .layer(axum::middleware::from_fn(middleware::logging::log_requests))
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
        .layer(middleware::create_timeout_layer(request_timeout))
        .layer(middleware::create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
