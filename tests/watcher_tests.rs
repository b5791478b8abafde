//! Crash watcher behavior against the in-memory directory.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use tps_core::config::WatcherConfig;
use tps_core::directory::InMemoryDirectory;
use tps_core::models::{ActualInstanceRecord, DesiredRecord, Placement, CRASH_REASON};
use tps_core::notifier::RecordingNotifier;

const PROCESS_GUID: &str = "process-guid";

fn directory_with_process(domain: &str) -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    directory.desire(DesiredRecord::new(PROCESS_GUID, domain, 2, "log-guid"));
    directory
}

async fn start_watcher(directory: InMemoryDirectory, config: WatcherConfig) -> WatcherHarness {
    WatcherHarness::start(directory, RecordingNotifier::new(), config).await
}

/// Place an instance at `index` and then crash it
fn run_then_crash(directory: &InMemoryDirectory, index: u32) {
    directory
        .start(
            PROCESS_GUID,
            index,
            &format!("instance-{index}"),
            Placement::new("1.2.3.4", 65100),
        )
        .unwrap();
    directory.crash(PROCESS_GUID, index, "exit status 1").unwrap();
}

#[tokio::test]
async fn test_crash_transition_reports_once() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    directory
        .start(PROCESS_GUID, 0, "instance-guid", Placement::new("1.2.3.4", 65100))
        .unwrap();
    let crashed = directory.crash(PROCESS_GUID, 0, "out of memory").unwrap();

    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);

    let reports = harness.notifier.reports();
    assert_eq!(reports.len(), 1);
    let (process_guid, report) = &reports[0];
    assert_eq!(process_guid, PROCESS_GUID);
    assert_eq!(report.instance_guid, "instance-guid");
    assert_eq!(report.index, 0);
    assert_eq!(report.reason, CRASH_REASON);
    assert_eq!(report.exit_description, "out of memory");
    assert_eq!(report.crash_count, 1);
    assert_eq!(report.crash_timestamp, crashed.since);

    // No duplicate delivery
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.notifier.attempts(), 1);
    assert_eq!(harness.crashes_detected(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_transitions_without_crash_increase_are_not_reported() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    directory.claim(PROCESS_GUID, 0, "instance-guid").unwrap();
    directory
        .start(PROCESS_GUID, 0, "instance-guid", Placement::new("1.2.3.4", 65100))
        .unwrap();
    directory.remove_actual(PROCESS_GUID, 0);

    assert!(harness.wait_for_events(3).await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(harness.crashes_detected(), 0);
    assert_eq!(harness.notifier.attempts(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_crash_count_reset_is_not_reported() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    let mut record = ActualInstanceRecord::unclaimed(PROCESS_GUID, 1, APP_DOMAIN);
    record.crash_count = 4;
    directory.upsert_actual(record.clone());

    record.crash_count = 0;
    directory.upsert_actual(record);

    assert!(harness.wait_for_events(2).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.notifier.attempts(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_crash_in_other_domain_is_ignored() {
    let harness = start_watcher(directory_with_process("tasks"), watcher_config()).await;
    let directory = harness.directory.clone();

    directory
        .start(PROCESS_GUID, 0, "instance-guid", Placement::new("1.2.3.4", 65100))
        .unwrap();
    directory.crash(PROCESS_GUID, 0, "exit status 1").unwrap();

    assert!(harness.wait_for_events(2).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.crashes_detected(), 0);
    assert_eq!(harness.notifier.attempts(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_configured_domain_is_used() {
    let config = WatcherConfig {
        app_domain: "tasks".to_string(),
        ..watcher_config()
    };
    let harness = start_watcher(directory_with_process("tasks"), config).await;

    run_then_crash(&harness.directory, 1);

    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);
    let report = &harness.notifier.reports()[0].1;
    assert_eq!(report.index, 1);
    assert_eq!(report.instance_guid, "instance-1");

    harness.stop().await;
}

#[tokio::test]
async fn test_two_stream_errors_are_tolerated() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    directory.inject_stream_error("connection reset");
    directory.inject_stream_error("connection reset");
    assert!(harness.wait_for_next_errors(2).await);

    // Still on the original subscription
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(directory.subscribe_attempts(), 1);
    assert_eq!(directory.open_subscriptions(), 1);

    // And still delivering from it
    run_then_crash(&directory, 0);
    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);
    assert_eq!(directory.subscribe_attempts(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_third_consecutive_stream_error_resubscribes() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    for _ in 0..3 {
        directory.inject_stream_error("connection reset");
    }
    assert!(harness.wait_for_next_errors(3).await);

    // Old subscription closed, exactly one new one open
    assert!(harness.wait_for_subscriptions(2, 1).await);
    assert_eq!(harness.stats.subscribe_attempts.load(Ordering::SeqCst), 2);

    // Events flow through the new subscription
    run_then_crash(&directory, 0);
    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);

    harness.stop().await;
}

#[tokio::test]
async fn test_delivered_event_resets_error_count() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    directory.inject_stream_error("connection reset");
    directory.inject_stream_error("connection reset");
    directory.claim(PROCESS_GUID, 0, "instance-guid").unwrap();
    directory.inject_stream_error("connection reset");
    directory.inject_stream_error("connection reset");

    assert!(harness.wait_for_next_errors(4).await);
    assert!(harness.wait_for_events(1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(directory.subscribe_attempts(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_failed_subscribes_are_retried() {
    let directory = directory_with_process(APP_DOMAIN);
    directory.fail_next_subscribes(2);

    let harness = WatcherHarness::spawn(directory, RecordingNotifier::new(), watcher_config()).await;
    assert!(harness.wait_for_subscriptions(3, 1).await);

    run_then_crash(&harness.directory, 0);
    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);

    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_subscription() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    assert_eq!(harness.directory.open_subscriptions(), 1);

    let notifier = harness.notifier.clone();
    let stats = harness.stats.clone();

    let directory = harness.stop().await;
    assert_eq!(directory.open_subscriptions(), 0);

    // Nothing is processed after shutdown
    run_then_crash(&directory, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stats.events_received.load(Ordering::SeqCst), 0);
    assert_eq!(stats.crashes_detected.load(Ordering::SeqCst), 0);
    assert_eq!(notifier.attempts(), 0);
}

#[tokio::test]
async fn test_closed_source_is_not_resubscribed() {
    let harness = start_watcher(directory_with_process(APP_DOMAIN), watcher_config()).await;
    let directory = harness.directory.clone();

    directory.close_subscriptions();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(directory.subscribe_attempts(), 1);
    assert_eq!(harness.stats.subscribe_attempts.load(Ordering::SeqCst), 1);
    assert_eq!(harness.stats.next_errors.load(Ordering::SeqCst), 0);
    assert!(!harness.handle.is_finished());

    // The watcher idles: later crashes go unreported
    run_then_crash(&directory, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.notifier.attempts(), 0);
    assert_eq!(directory.subscribe_attempts(), 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_while_subscribing() {
    let directory = directory_with_process(APP_DOMAIN);
    directory.set_available(false);
    let config = WatcherConfig {
        retry_delay_ms: 10,
        ..watcher_config()
    };

    let harness = WatcherHarness::spawn(directory, RecordingNotifier::new(), config).await;
    let attempts = harness.directory.clone();
    assert!(eventually(WAIT, move || attempts.subscribe_attempts() >= 2).await);

    let directory = harness.stop().await;
    directory.set_available(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(directory.open_subscriptions(), 0);
}

#[tokio::test]
async fn test_notification_failure_is_not_retried() {
    let notifier = RecordingNotifier::new();
    notifier.set_failing(true);
    let harness = WatcherHarness::start(
        directory_with_process(APP_DOMAIN),
        notifier,
        watcher_config(),
    )
    .await;
    let directory = harness.directory.clone();

    run_then_crash(&directory, 0);
    assert!(harness.notifier.wait_for_attempts(1, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.notifier.attempts(), 1);
    assert!(harness.notifier.reports().is_empty());

    // The watcher keeps going after a failed delivery
    harness.notifier.set_failing(false);
    directory.crash(PROCESS_GUID, 0, "exit status 1").unwrap();
    assert!(harness.notifier.wait_for_attempts(2, WAIT).await);
    assert_eq!(harness.notifier.reports()[0].1.crash_count, 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_saturated_pool_delays_but_delivers_every_report() {
    let notifier = RecordingNotifier::new().with_delay(Duration::from_millis(100));
    let config = WatcherConfig {
        work_pool_size: 1,
        ..watcher_config()
    };
    let harness =
        WatcherHarness::start(directory_with_process(APP_DOMAIN), notifier, config).await;
    let directory = harness.directory.clone();

    for index in 0..2 {
        directory
            .start(PROCESS_GUID, index, "instance-guid", Placement::new("1.2.3.4", 65100))
            .unwrap();
    }
    assert!(harness.wait_for_events(2).await);

    for index in 0..2 {
        directory.crash(PROCESS_GUID, index, "exit status 1").unwrap();
    }
    directory.claim(PROCESS_GUID, 0, "instance-guid").unwrap();

    // Second report waits for the single worker, holding back the following event
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(harness.notifier.attempts(), 0);
    assert_eq!(harness.crashes_detected(), 2);
    assert_eq!(harness.stats.events_received.load(Ordering::SeqCst), 4);

    assert!(harness.notifier.wait_for_attempts(2, WAIT).await);
    assert!(harness.wait_for_events(5).await);

    harness.stop().await;
}

#[tokio::test]
async fn test_shutdown_while_waiting_for_worker() {
    let notifier = RecordingNotifier::new().with_delay(Duration::from_secs(30));
    let config = WatcherConfig {
        work_pool_size: 1,
        ..watcher_config()
    };
    let harness =
        WatcherHarness::start(directory_with_process(APP_DOMAIN), notifier, config).await;
    let directory = harness.directory.clone();

    run_then_crash(&directory, 0);
    run_then_crash(&directory, 1);
    let stats = harness.stats.clone();
    assert!(eventually(WAIT, move || stats.crashes_detected.load(Ordering::SeqCst) == 2).await);

    let directory = harness.stop().await;
    assert_eq!(directory.open_subscriptions(), 0);
}
