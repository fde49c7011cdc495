// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task execution framework.
//!
//! One claimed dispatch runs through a fixed lifecycle:
//! every attempt marks the action RUNNING, a successful execution finalizes
//! SUCCESS, a retryable error sleeps and tries again within the attempt
//! budget, and anything else finalizes FAILURE. Terminal writes go through
//! the store's conditional finalize, so a cancellation that landed while
//! the dispatch was queued or running keeps the action CANCELLED.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument, warn};

use autoact_core::model::epoch_now;
use autoact_core::{ActionStatus, CoreError, DispatchRecord, Store};

use crate::error::ExecutionError;
use crate::executors::{ExecutionContext, Operation};
use crate::metrics::ActionMetrics;

/// Runs claimed dispatches against the executor set.
pub struct TaskRunner {
    store: Arc<dyn Store>,
    metrics: ActionMetrics,
    ctx: ExecutionContext,
    /// Total attempts per action, first try included.
    max_attempts: u32,
    /// Fixed sleep between attempts.
    retry_delay: Duration,
}

impl TaskRunner {
    pub fn new(
        store: Arc<dyn Store>,
        metrics: ActionMetrics,
        ctx: ExecutionContext,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            ctx,
            max_attempts,
            retry_delay,
        }
    }

    /// Execute one dispatch to its terminal outcome.
    ///
    /// Returns Ok whether the action succeeded, failed, or was skipped; an
    /// Err is a store failure, after which the dispatch stays claimed and
    /// redelivers when its lease expires.
    #[instrument(skip(self, dispatch), fields(action_id = %dispatch.action_id, operation = %dispatch.operation))]
    pub async fn run_action(&self, dispatch: &DispatchRecord) -> Result<(), CoreError> {
        // 1. Load the action; a dispatch for a vanished record is dropped.
        let action = self.store.get_action_or_fail(&dispatch.action_id).await?;

        // 2. Cancelled (or otherwise finished) while queued: nothing to run.
        if action.status.is_terminal() {
            info!(status = %action.status, "action already terminal, skipping execution");
            return Ok(());
        }

        let task_args = strip_action_reference(&dispatch.args);

        // 3. Unknown operation name means the API and worker have drifted.
        let Some(operation) = Operation::from_name(&dispatch.operation) else {
            let message = format!("unsupported operation '{}'", dispatch.operation);
            warn!("{}", message);
            if !self
                .store
                .set_action_status(&dispatch.action_id, ActionStatus::Running)
                .await?
            {
                info!("action reached a terminal state before execution, stopping");
                return Ok(());
            }
            self.finalize(
                &dispatch.action_id,
                &dispatch.operation,
                ActionStatus::Failure,
                &message,
                &task_args,
                action.created_at,
            )
            .await?;
            return Ok(());
        };

        // 4. Attempt loop. The per-attempt RUNNING write is conditional: if
        // it does not apply, a cancel landed between attempts and the
        // outcome of any further execution must not overwrite it.
        for attempt in 1..=self.max_attempts {
            if !self
                .store
                .set_action_status(&dispatch.action_id, ActionStatus::Running)
                .await?
            {
                info!(attempt, "action reached a terminal state mid-run, stopping");
                return Ok(());
            }

            match operation.execute(&dispatch.args, &self.ctx).await {
                Ok(message) => {
                    let result = message.unwrap_or_else(|| "ok".to_string());
                    self.finalize(
                        &dispatch.action_id,
                        operation.name(),
                        ActionStatus::Success,
                        &result,
                        &task_args,
                        action.created_at,
                    )
                    .await?;
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    self.log_exhausted(attempt, &err);
                    self.finalize(
                        &dispatch.action_id,
                        operation.name(),
                        ActionStatus::Failure,
                        err.message(),
                        &task_args,
                        action.created_at,
                    )
                    .await?;
                    return Ok(());
                }
            }
        }

        // Unreachable: the loop always finalizes on the last attempt.
        Ok(())
    }

    fn log_exhausted(&self, attempt: u32, err: &ExecutionError) {
        if err.is_retryable() {
            warn!(attempt, error = %err, "attempt budget exhausted");
        } else {
            warn!(attempt, error = %err, "non-retryable failure");
        }
    }

    /// Conditional terminal write plus the elapsed-time observation.
    async fn finalize(
        &self,
        action_id: &str,
        name: &str,
        status: ActionStatus,
        result: &str,
        task_args: &Value,
        created_at: f64,
    ) -> Result<(), CoreError> {
        let applied = self
            .store
            .finalize_action(action_id, status, result, task_args)
            .await?;

        if !applied {
            // A racing cancel recorded the terminal state first.
            info!(action_id, "terminal write lost the race, keeping existing state");
            return Ok(());
        }

        let elapsed = (epoch_now() - created_at).max(0.0);
        let outcome = status.to_string();
        self.metrics.observe_elapsed(name, &outcome, elapsed);
        info!(action_id, outcome = %status, elapsed_secs = elapsed, "action finished");
        Ok(())
    }
}

/// The recorded task_args snapshot is the dispatch arguments without the
/// action reference itself.
fn strip_action_reference(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("action_id");
            Value::Object(map)
        }
        other => other.clone(),
    }
}
