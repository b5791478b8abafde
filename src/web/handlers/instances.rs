//! Single-process status handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use tracing::debug;

use super::validate_guid;
use crate::web::errors::ApiResult;
use crate::web::middleware::auth::AuthToken;
use crate::web::response_types::InstanceStatusResponse;
use crate::web::state::AppState;

/// Reconciled instance status: GET /v1/actual_lrps/:process_guid
pub async fn get_instance_status(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
) -> ApiResult<Json<Vec<InstanceStatusResponse>>> {
    let process_guid = validate_guid(&process_guid)?;
    debug!(process_guid = %process_guid, "Fetching instance status");

    let views = state.aggregator.instance_status(process_guid).await?;
    Ok(Json(InstanceStatusResponse::from_views(&views, Utc::now())))
}

/// Instance status with usage stats: GET /v1/actual_lrps/:process_guid/stats
///
/// Stats are omitted, not failed, when the telemetry broker cannot be reached.
pub async fn get_instance_stats(
    State(state): State<AppState>,
    Path(process_guid): Path<String>,
    Extension(token): Extension<AuthToken>,
) -> ApiResult<Json<Vec<InstanceStatusResponse>>> {
    let process_guid = validate_guid(&process_guid)?;
    debug!(process_guid = %process_guid, "Fetching instance status with stats");

    let views = state
        .aggregator
        .instance_status_with_stats(process_guid, token.as_str())
        .await?;
    Ok(Json(InstanceStatusResponse::from_views(&views, Utc::now())))
}
