use async_trait::async_trait;
use tracing::debug;

use super::{CrashNotifier, NotificationError};
use crate::config::NotifierConfig;
use crate::models::CrashReport;

/// Posts crash reports to `{base}/internal/apps/{process_guid}/crashed` with basic auth
#[derive(Debug, Clone)]
pub struct HttpCrashNotifier {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpCrashNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NotificationError::Transport(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn crashed_url(&self, process_guid: &str) -> String {
        format!("{}/internal/apps/{process_guid}/crashed", self.base_url)
    }
}

#[async_trait]
impl CrashNotifier for HttpCrashNotifier {
    async fn report_crash(
        &self,
        process_guid: &str,
        report: &CrashReport,
    ) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(self.crashed_url(process_guid))
            .basic_auth(&self.username, Some(&self.password))
            .json(report)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(
            process_guid = %process_guid,
            index = report.index,
            status = status.as_u16(),
            "Crash report accepted"
        );
        Ok(())
    }
}
