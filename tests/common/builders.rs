//! Fixture builders shared by the integration suites.

use std::sync::Arc;
use std::time::Duration;

use tps_core::config::{WatcherConfig, WebConfig};
use tps_core::directory::InMemoryDirectory;
use tps_core::models::{DesiredRecord, Placement};
use tps_core::status::StatusAggregator;
use tps_core::telemetry::{ContainerMetric, Envelope, StaticTelemetryClient};

pub const APP_DOMAIN: &str = "cf-apps";
pub const AUTH_TOKEN: &str = "I can do this.";

pub fn watcher_config() -> WatcherConfig {
    WatcherConfig {
        retry_delay_ms: 0,
        ..WatcherConfig::default()
    }
}

pub fn web_config() -> WebConfig {
    WebConfig::default()
}

/// Three declared instances: index 0 claimed, index 1 running at 1.2.3.4:65100, index 2
/// not yet observed
pub fn three_instance_process(directory: &InMemoryDirectory, process_guid: &str, log_guid: &str) {
    directory.desire(DesiredRecord::new(process_guid, APP_DOMAIN, 3, log_guid));
    directory
        .claim(process_guid, 0, &format!("{process_guid}-instance-0"))
        .expect("claim index 0");
    directory
        .start(
            process_guid,
            1,
            &format!("{process_guid}-instance-1"),
            Placement::new("1.2.3.4", 65100),
        )
        .expect("start index 1");
}

pub fn container_metric(index: i32, cpu_percentage: f64, memory: u64, disk: u64) -> Envelope {
    Envelope::container_metric(
        "rep",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        ContainerMetric {
            application_id: "process-guid".to_string(),
            instance_index: index,
            cpu_percentage,
            memory_bytes: memory,
            disk_bytes: disk,
        },
    )
}

pub fn aggregator(
    directory: &InMemoryDirectory,
    telemetry: &StaticTelemetryClient,
    drain_window: Duration,
) -> StatusAggregator {
    StatusAggregator::new(
        Arc::new(directory.clone()),
        Arc::new(telemetry.clone()),
        drain_window,
        4,
    )
}
