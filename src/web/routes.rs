//! # Web API Route Definitions

use axum::routing::get;
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Routes open to any caller
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route(
            "/v1/actual_lrps/:process_guid",
            get(handlers::instances::get_instance_status),
        )
}

/// Routes that require an `Authorization` header
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/actual_lrps/:process_guid/stats",
            get(handlers::instances::get_instance_stats),
        )
        .route(
            "/v1/bulk_actual_lrp_status",
            get(handlers::bulk::get_bulk_status),
        )
}
