//! # Authorization Middleware
//!
//! Checks that protected requests carry an `Authorization` header. The header is not
//! validated here: it is forwarded verbatim to the telemetry broker, which owns the policy.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::web::errors::ApiError;
use crate::web::state::AppState;

/// Credentials presented by the caller, as received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn require_authorization(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match request.headers().get(AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(token) if !token.trim().is_empty() => Some(token.to_string()),
            Ok(_) => None,
            Err(_) => {
                warn!("Authorization header contains non-UTF-8 bytes");
                return Err(ApiError::Unauthorized);
            }
        },
        None => None,
    };

    match token {
        Some(token) => {
            request.extensions_mut().insert(AuthToken(token));
        }
        None if state.config.auth_required => {
            debug!(uri = %request.uri(), "Rejecting request without authorization");
            return Err(ApiError::Unauthorized);
        }
        None => {
            request.extensions_mut().insert(AuthToken(String::new()));
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_token_as_str() {
        let token = AuthToken("bearer abc".to_string());
        assert_eq!(token.as_str(), "bearer abc");
    }
}
