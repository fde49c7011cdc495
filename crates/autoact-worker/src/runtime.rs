// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker runtime: the dispatch polling loop.
//!
//! Claims one dispatch at a time and runs it to a terminal outcome before
//! claiming the next. Crash recovery comes from the dispatch lease: a
//! worker that dies mid-execution leaves a claimed row behind, and the
//! dispatch becomes claimable again once the lease expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info};

use autoact_core::Store;

use crate::task::TaskRunner;

/// Dispatch polling loop that runs as a background task.
pub struct WorkerRuntime {
    store: Arc<dyn Store>,
    runner: TaskRunner,
    poll_interval: Duration,
    lease_seconds: u64,
    shutdown: Arc<Notify>,
}

impl WorkerRuntime {
    pub fn new(
        store: Arc<dyn Store>,
        runner: TaskRunner,
        poll_interval: Duration,
        lease_seconds: u64,
    ) -> Self {
        Self {
            store,
            runner,
            poll_interval,
            lease_seconds,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the polling loop until shutdown is signalled.
    pub async fn run(self) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            lease_seconds = self.lease_seconds,
            "Worker runtime started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Worker runtime shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.drain_queue().await {
                        error!(error = %e, "Failed to process dispatch queue");
                    }
                }
            }
        }
    }

    /// Claim and run dispatches until the queue is empty.
    async fn drain_queue(&self) -> Result<(), autoact_core::CoreError> {
        loop {
            let Some(dispatch) = self.store.claim_dispatch(self.lease_seconds).await? else {
                debug!("No claimable dispatches");
                return Ok(());
            };

            info!(
                action_id = %dispatch.action_id,
                operation = %dispatch.operation,
                "Dispatch claimed"
            );

            match self.runner.run_action(&dispatch).await {
                Ok(()) => {
                    self.store.complete_dispatch(&dispatch.action_id).await?;
                }
                Err(e) => {
                    // The claim stands; the lease expiring redelivers it.
                    error!(
                        action_id = %dispatch.action_id,
                        error = %e,
                        "Dispatch execution failed, leaving it for redelivery"
                    );
                }
            }
        }
    }
}
