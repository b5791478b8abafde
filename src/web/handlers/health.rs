//! # Health Check Handlers

use axum::Json;

use crate::web::response_types::HealthResponse;

/// Basic health check endpoint: GET /health
///
/// Answers as long as the process is serving; upstreams are not contacted.
pub async fn basic_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
