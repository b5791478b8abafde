//! # Web API Request Handlers
//!
//! - [`instances`] - status and status-with-stats for one process
//! - [`bulk`] - status for many processes
//! - [`health`] - liveness

pub mod bulk;
pub mod health;
pub mod instances;

use crate::web::errors::{ApiError, ApiResult};

const MAX_GUID_LEN: usize = 255;

/// Reject process guids that cannot name a directory record
pub fn validate_guid(guid: &str) -> ApiResult<&str> {
    if guid.is_empty() {
        return Err(ApiError::bad_request("process guid must not be empty"));
    }
    if guid.len() > MAX_GUID_LEN {
        return Err(ApiError::bad_request(format!(
            "process guid exceeds {MAX_GUID_LEN} characters"
        )));
    }
    if guid.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/' || c == ',') {
        return Err(ApiError::bad_request(format!(
            "process guid contains invalid characters: {guid:?}"
        )));
    }
    Ok(guid)
}
