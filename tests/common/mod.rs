#![allow(dead_code)]

pub mod builders;
pub mod strategies;
pub mod watcher_harness;

pub use builders::*;
pub use watcher_harness::*;

use std::time::Duration;

/// Poll `check` until it holds or `timeout` elapses
pub async fn eventually<F>(timeout: Duration, check: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
