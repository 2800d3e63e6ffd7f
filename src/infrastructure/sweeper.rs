//! Background store sweeper
//!
//! Periodically drops expired entries from the shared store so state,
//! counter and violation records do not accumulate between lookups.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::store::KeyValueStore;

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub struct BackgroundSweeper {
    store: Arc<dyn KeyValueStore>,
    interval: Duration,
}

/// Handle to a running sweeper
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl BackgroundSweeper {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one sweep, returning the number of purged entries
    pub async fn sweep_once(&self) -> usize {
        match self.store.purge_expired().await {
            Ok(0) => 0,
            Ok(purged) => {
                debug!(backend = self.store.backend(), purged, "Swept expired entries");
                purged
            }
            Err(e) => {
                warn!(backend = self.store.backend(), error = %e, "Store sweep failed");
                0
            }
        }
    }

    /// Start sweeping on the current runtime
    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        info!(interval_secs = self.interval.as_secs(), "Starting background sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }

            debug!("Background sweeper stopped");
        });

        SweeperHandle { cancel, task }
    }
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweeper and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Background sweeper task failed");
        }
    }
}
