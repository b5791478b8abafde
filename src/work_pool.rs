//! # Work Pool
//!
//! Fixed-size pool for fire-and-forget async work. `submit` waits for a free worker before
//! spawning, so a producer that outpaces the pool is throttled to the pool's throughput
//! instead of queueing without bound or dropping work.
//!
//! ```text
//! submit(work) → [Semaphore: N permits] → tokio::spawn(work) → permit released on completion
//! ```
//!
//! ```rust
//! use tps_core::work_pool::WorkPool;
//!
//! # tokio_test::block_on(async {
//! let pool = WorkPool::new(2).unwrap();
//! pool.submit(async { /* deliver a report */ }).await.unwrap();
//! assert_eq!(pool.size(), 2);
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{TpsError, TpsResult};

#[derive(Debug, Clone)]
pub struct WorkPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkPool {
    pub fn new(size: usize) -> TpsResult<Self> {
        if size == 0 {
            return Err(TpsError::Configuration(
                "work pool size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Run `work` on a free worker, waiting for one if all are busy.
    ///
    /// Returns once the work has been spawned, not when it finishes.
    pub async fn submit<F>(&self, work: F) -> TpsResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TpsError::PoolClosed)?;

        debug!(
            busy = self.busy_workers(),
            size = self.size,
            "Submitting work to pool"
        );

        tokio::spawn(async move {
            // Held for the lifetime of the work, including unwinding on panic
            let _permit = permit;
            work.await;
        });

        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn busy_workers(&self) -> usize {
        self.size.saturating_sub(self.available_workers())
    }

    /// Refuse further submissions; work already running is unaffected
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
