//! Multi-process status handler.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::validate_guid;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::response_types::InstanceStatusResponse;
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct BulkStatusQuery {
    /// Comma-separated process guids
    pub guids: Option<String>,
}

/// Split and validate the `guids` parameter; blank entries are skipped
pub fn parse_guids(raw: Option<&str>) -> ApiResult<Vec<String>> {
    let guids = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|guid| !guid.is_empty())
        .map(|guid| validate_guid(guid).map(str::to_string))
        .collect::<ApiResult<Vec<_>>>()?;

    if guids.is_empty() {
        return Err(ApiError::bad_request("guids query parameter is required"));
    }
    Ok(guids)
}

/// Status for several processes: GET /v1/bulk_actual_lrp_status?guids=a,b
///
/// Processes that cannot be resolved are left out of the response.
pub async fn get_bulk_status(
    State(state): State<AppState>,
    Query(query): Query<BulkStatusQuery>,
) -> ApiResult<Json<HashMap<String, Vec<InstanceStatusResponse>>>> {
    let guids = parse_guids(query.guids.as_deref())?;
    debug!(requested = guids.len(), "Fetching bulk instance status");

    let statuses = state.aggregator.bulk_status(&guids).await;

    let now = Utc::now();
    Ok(Json(
        statuses
            .into_iter()
            .map(|(guid, views)| (guid, InstanceStatusResponse::from_views(&views, now)))
            .collect(),
    ))
}
