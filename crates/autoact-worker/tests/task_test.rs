// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Task framework tests with a scripted cluster gateway.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use autoact_core::{
    ActionRecord, ActionStatus, CoreError, DispatchRecord, SqliteStore, Store, UserRecord,
};
use autoact_worker::error::ExecutionError;
use autoact_worker::executors::ExecutionContext;
use autoact_worker::executors::aws::AwsGateway;
use autoact_worker::executors::gateway::ClusterGateway;
use autoact_worker::metrics::ActionMetrics;
use autoact_worker::task::TaskRunner;

/// Gateway that pops one scripted outcome per invocation and counts calls.
struct ScriptedGateway {
    script: Mutex<Vec<Result<(), ExecutionError>>>,
    calls: AtomicU32,
}

impl ScriptedGateway {
    /// Outcomes are given in invocation order.
    fn new(script: Vec<Result<(), ExecutionError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Result<(), ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            Ok(())
        } else {
            script.remove(0)
        }
    }
}

#[async_trait]
impl ClusterGateway for ScriptedGateway {
    async fn rolling_restart(
        &self,
        _cluster: &str,
        _namespace: &str,
        _kind: &str,
        _name: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome()
    }

    async fn delete_pod(
        &self,
        _cluster: &str,
        _namespace: &str,
        _name: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome()
    }
}

#[async_trait]
impl AwsGateway for ScriptedGateway {
    async fn reboot_db_instance(
        &self,
        _account: &str,
        _identifier: &str,
        _force_failover: bool,
    ) -> Result<(), ExecutionError> {
        self.next_outcome()
    }

    async fn create_db_snapshot(
        &self,
        _account: &str,
        _identifier: &str,
        _snapshot_identifier: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome()
    }

    async fn export_db_logs(
        &self,
        _account: &str,
        _identifier: &str,
        _s3_file_name: Option<&str>,
        _expiration_days: u32,
    ) -> Result<Option<String>, ExecutionError> {
        self.next_outcome()
            .map(|_| Some("https://s3.example.com/logs.zip".to_string()))
    }

    async fn flush_elasticache(
        &self,
        _account: &str,
        _identifier: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome()
    }
}

/// Store decorator recording every status write, delegating everything.
struct RecordingStore {
    inner: SqliteStore,
    statuses: Mutex<Vec<ActionStatus>>,
}

impl RecordingStore {
    fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            statuses: Mutex::new(Vec::new()),
        }
    }

    fn recorded_statuses(&self) -> Vec<ActionStatus> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn create_action(&self, name: &str, owner: &str) -> Result<ActionRecord, CoreError> {
        self.inner.create_action(name, owner).await
    }

    async fn get_action(&self, action_id: &str) -> Result<Option<ActionRecord>, CoreError> {
        self.inner.get_action(action_id).await
    }

    async fn set_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<bool, CoreError> {
        self.statuses.lock().unwrap().push(status);
        self.inner.set_action_status(action_id, status).await
    }

    async fn finalize_action(
        &self,
        action_id: &str,
        status: ActionStatus,
        result: &str,
        task_args: &Value,
    ) -> Result<bool, CoreError> {
        self.inner
            .finalize_action(action_id, status, result, task_args)
            .await
    }

    async fn cancel_action(&self, action_id: &str) -> Result<ActionRecord, CoreError> {
        self.inner.cancel_action(action_id).await
    }

    async fn list_actions_by_owner(
        &self,
        owner: &str,
        status: Option<ActionStatus>,
        max_age_seconds: Option<u64>,
    ) -> Result<Vec<ActionRecord>, CoreError> {
        self.inner
            .list_actions_by_owner(owner, status, max_age_seconds)
            .await
    }

    async fn upsert_user(
        &self,
        email: &str,
        name: &str,
        username: &str,
    ) -> Result<UserRecord, CoreError> {
        self.inner.upsert_user(email, name, username).await
    }

    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, CoreError> {
        self.inner.get_user(email).await
    }

    async fn set_allowed_actions(&self, email: &str, actions: &[String]) -> Result<(), CoreError> {
        self.inner.set_allowed_actions(email, actions).await
    }

    async fn enqueue_dispatch(
        &self,
        action_id: &str,
        operation: &str,
        args: &Value,
    ) -> Result<(), CoreError> {
        self.inner.enqueue_dispatch(action_id, operation, args).await
    }

    async fn claim_dispatch(
        &self,
        lease_seconds: u64,
    ) -> Result<Option<DispatchRecord>, CoreError> {
        self.inner.claim_dispatch(lease_seconds).await
    }

    async fn complete_dispatch(&self, action_id: &str) -> Result<(), CoreError> {
        self.inner.complete_dispatch(action_id).await
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        self.inner.health_check().await
    }
}

async fn recording_store() -> Arc<RecordingStore> {
    let inner = SqliteStore::in_memory().await.unwrap();
    Arc::new(RecordingStore::new(inner))
}

fn runner_with(
    store: Arc<RecordingStore>,
    gateway: Arc<ScriptedGateway>,
    max_attempts: u32,
) -> (TaskRunner, ActionMetrics) {
    let metrics = ActionMetrics::default();
    let runner = TaskRunner::new(
        store,
        metrics.clone(),
        ExecutionContext {
            gateway: gateway.clone(),
            aws: gateway,
        },
        max_attempts,
        Duration::ZERO,
    );
    (runner, metrics)
}

/// Create a restart action with its dispatch enqueued, then claim it.
async fn claimed_restart_dispatch(store: &RecordingStore) -> DispatchRecord {
    let action = store
        .create_action("openshift-workload-restart", "alice@example.com")
        .await
        .unwrap();
    let args = json!({
        "action_id": action.action_id,
        "cluster": "prod-1",
        "namespace": "payments",
        "kind": "Deployment",
        "name": "api",
    });
    store
        .enqueue_dispatch(&action.action_id, "openshift-workload-restart", &args)
        .await
        .unwrap();
    store.claim_dispatch(300).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_no_op_runs_to_success() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![]);
    let (runner, metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let action = store
        .create_action("noop", "alice@example.com")
        .await
        .unwrap();
    let args = json!({ "action_id": action.action_id });
    store
        .enqueue_dispatch(&action.action_id, "noop", &args)
        .await
        .unwrap();
    let dispatch = store.claim_dispatch(300).await.unwrap().unwrap();

    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&action.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Success);
    assert_eq!(action.result.as_deref(), Some("ok"));
    // The snapshot excludes the action reference, leaving nothing for no-op
    assert_eq!(action.task_args, Some(json!({})));
    assert_eq!(gateway.calls(), 0);
    assert_eq!(metrics.count("noop", "SUCCESS"), 1);
}

#[tokio::test]
async fn test_success_after_transient_failure() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![
        Err(ExecutionError::transient("connection reset")),
        Ok(()),
    ]);
    let (runner, metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let dispatch = claimed_restart_dispatch(&store).await;
    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Success);
    assert!(action.result.unwrap().contains("rolling restart"));
    assert_eq!(gateway.calls(), 2);
    // RUNNING written once per attempt
    assert_eq!(
        store.recorded_statuses(),
        vec![ActionStatus::Running, ActionStatus::Running]
    );
    assert_eq!(metrics.count("openshift-workload-restart", "SUCCESS"), 1);
}

#[tokio::test]
async fn test_transient_failures_exhaust_attempt_budget() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![
        Err(ExecutionError::transient("timeout")),
        Err(ExecutionError::transient("timeout")),
        Err(ExecutionError::transient("upstream returned 503")),
    ]);
    let (runner, metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let dispatch = claimed_restart_dispatch(&store).await;
    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Failure);
    // The result carries the last attempt's error
    assert_eq!(action.result.as_deref(), Some("upstream returned 503"));
    assert_eq!(gateway.calls(), 3);
    assert_eq!(store.recorded_statuses().len(), 3);
    assert_eq!(metrics.count("openshift-workload-restart", "FAILURE"), 1);
}

#[tokio::test]
async fn test_terminal_failure_is_not_retried() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![Err(ExecutionError::terminal("no such namespace"))]);
    let (runner, _metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let dispatch = claimed_restart_dispatch(&store).await;
    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Failure);
    assert_eq!(action.result.as_deref(), Some("no such namespace"));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn test_failure_snapshot_carries_task_args() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![Err(ExecutionError::terminal("no such namespace"))]);
    let (runner, _metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let dispatch = claimed_restart_dispatch(&store).await;
    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    let task_args = action.task_args.unwrap();
    assert_eq!(task_args["cluster"], "prod-1");
    assert_eq!(task_args["kind"], "Deployment");
    assert!(task_args.get("action_id").is_none());
}

#[tokio::test]
async fn test_cancelled_action_is_skipped() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![]);
    let (runner, metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let dispatch = claimed_restart_dispatch(&store).await;
    store.cancel_action(&dispatch.action_id).await.unwrap();

    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Cancelled);
    assert_eq!(gateway.calls(), 0);
    assert!(store.recorded_statuses().is_empty());
    assert_eq!(metrics.count("openshift-workload-restart", "SUCCESS"), 0);
}

#[tokio::test]
async fn test_unknown_operation_fails_terminally() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![]);
    let (runner, _metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let action = store
        .create_action("reboot-the-moon", "alice@example.com")
        .await
        .unwrap();
    let args = json!({ "action_id": action.action_id });
    store
        .enqueue_dispatch(&action.action_id, "reboot-the-moon", &args)
        .await
        .unwrap();
    let dispatch = store.claim_dispatch(300).await.unwrap().unwrap();

    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&action.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Failure);
    assert!(action.result.unwrap().contains("unsupported operation"));
    assert_eq!(gateway.calls(), 0);
    // The drift failure still passes through RUNNING on its way to FAILURE
    assert_eq!(store.recorded_statuses(), vec![ActionStatus::Running]);
}

/// Gateway that cancels the action out of band during its first call, then
/// reports a transient failure so the runner schedules another attempt.
struct CancellingGateway {
    store: Arc<RecordingStore>,
    action_id: String,
    calls: AtomicU32,
}

impl CancellingGateway {
    async fn next_outcome(&self) -> Result<(), ExecutionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            self.store.cancel_action(&self.action_id).await.unwrap();
            Err(ExecutionError::transient("connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ClusterGateway for CancellingGateway {
    async fn rolling_restart(
        &self,
        _cluster: &str,
        _namespace: &str,
        _kind: &str,
        _name: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome().await
    }

    async fn delete_pod(
        &self,
        _cluster: &str,
        _namespace: &str,
        _name: &str,
    ) -> Result<(), ExecutionError> {
        self.next_outcome().await
    }
}

#[tokio::test]
async fn test_cancel_between_attempts_sticks() {
    let store = recording_store().await;
    let dispatch = claimed_restart_dispatch(&store).await;
    let gateway = Arc::new(CancellingGateway {
        store: store.clone(),
        action_id: dispatch.action_id.clone(),
        calls: AtomicU32::new(0),
    });
    let metrics = ActionMetrics::default();
    let runner = TaskRunner::new(
        store.clone(),
        metrics.clone(),
        ExecutionContext {
            gateway: gateway.clone(),
            aws: ScriptedGateway::new(vec![]),
        },
        3,
        Duration::ZERO,
    );

    runner.run_action(&dispatch).await.unwrap();

    // The retry that would have succeeded never ran, and the cancel
    // recorded while attempt one was in flight is the final word.
    let action = store.get_action_or_fail(&dispatch.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Cancelled);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.count("openshift-workload-restart", "SUCCESS"), 0);
}

#[tokio::test]
async fn test_pod_kind_deletes_instead_of_restarting() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![Ok(())]);
    let (runner, _metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let action = store
        .create_action("openshift-workload-restart", "alice@example.com")
        .await
        .unwrap();
    let args = json!({
        "action_id": action.action_id,
        "cluster": "prod-1",
        "namespace": "payments",
        "kind": "Pod",
        "name": "api-7f9c",
    });
    store
        .enqueue_dispatch(&action.action_id, "openshift-workload-restart", &args)
        .await
        .unwrap();
    let dispatch = store.claim_dispatch(300).await.unwrap().unwrap();

    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&action.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Success);
    assert!(action.result.unwrap().contains("deleted"));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn test_rds_log_export_result_carries_download_link() {
    let store = recording_store().await;
    let gateway = ScriptedGateway::new(vec![Ok(())]);
    let (runner, metrics) = runner_with(store.clone(), gateway.clone(), 3);

    let action = store
        .create_action("external-resource-rds-logs", "alice@example.com")
        .await
        .unwrap();
    let args = json!({
        "action_id": action.action_id,
        "account": "app-sre",
        "identifier": "orders-db",
        "s3_file_name": null,
        "expiration_days": 7,
    });
    store
        .enqueue_dispatch(&action.action_id, "external-resource-rds-logs", &args)
        .await
        .unwrap();
    let dispatch = store.claim_dispatch(300).await.unwrap().unwrap();

    runner.run_action(&dispatch).await.unwrap();

    let action = store.get_action_or_fail(&action.action_id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Success);
    let result = action.result.unwrap();
    assert!(result.contains("https://s3.example.com/logs.zip"));
    assert!(result.contains("expire in 7 days"));
    assert_eq!(gateway.calls(), 1);
    assert_eq!(metrics.count("external-resource-rds-logs", "SUCCESS"), 1);
}
