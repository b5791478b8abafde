//! # Web API Error Types
//!
//! HTTP-facing errors and their response conversions. Bodies share one shape:
//! `{"error": {"code": "...", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::TpsError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Upstream unavailable: {message}")]
    Upstream { message: String },

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::BadRequest { .. } => "BAD_REQUEST",
            ApiError::Upstream { .. } => "UPSTREAM_UNAVAILABLE",
            ApiError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (status_code, Json(body)).into_response()
    }
}

impl From<TpsError> for ApiError {
    fn from(err: TpsError) -> Self {
        match err {
            TpsError::NotFound(guid) => ApiError::not_found(format!("process {guid}")),
            TpsError::InvalidInput(message) => ApiError::bad_request(message),
            TpsError::UpstreamUnavailable(message) => ApiError::upstream(message),
            TpsError::TelemetryUnavailable(_)
            | TpsError::NotificationFailure(_)
            | TpsError::Configuration(_)
            | TpsError::PoolClosed => ApiError::Internal,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
