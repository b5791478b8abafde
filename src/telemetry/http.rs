//! HTTP client for the telemetry broker's container metrics endpoint.
//!
//! `GET {base}/apps/{log_guid}/containermetrics` returns a JSON array holding the most
//! recent envelope per instance. The caller's `Authorization` header is forwarded as-is.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use tracing::debug;

use super::{Envelope, MetricStream, TelemetryClient, TelemetryError};
use crate::config::TelemetryConfig;

#[derive(Debug, Clone)]
pub struct HttpTelemetryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTelemetryClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(config.drain_window())
            .build()
            .map_err(|e| TelemetryError::Unavailable(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TelemetryClient for HttpTelemetryClient {
    async fn open_session(
        &self,
        log_guid: &str,
        auth_token: &str,
    ) -> Result<MetricStream, TelemetryError> {
        let url = format!("{}/apps/{log_guid}/containermetrics", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, auth_token)
            .send()
            .await
            .map_err(|e| TelemetryError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(TelemetryError::Unauthorized)
            }
            status if !status.is_success() => {
                return Err(TelemetryError::Unavailable(format!(
                    "container metrics returned {status}"
                )))
            }
            _ => {}
        }

        let items: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| TelemetryError::Decode(e.to_string()))?;

        debug!(log_guid = %log_guid, envelopes = items.len(), "Received container metrics");

        // Decode per item so one malformed envelope does not discard the rest
        let envelopes = items.into_iter().map(|item| {
            serde_json::from_value::<Envelope>(item).map_err(|e| TelemetryError::Decode(e.to_string()))
        });

        Ok(stream::iter(envelopes.collect::<Vec<_>>()).boxed())
    }
}
