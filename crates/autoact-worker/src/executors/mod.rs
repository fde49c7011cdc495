// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operation executors.
//!
//! The set of operations is closed: a dispatch names one of the variants
//! below, and an unknown name is a terminal failure (the API and the worker
//! have drifted apart). Each executor receives the dispatch arguments and
//! the shared [`ExecutionContext`], and returns an optional result message;
//! `None` means the generic "ok".

pub mod aws;
pub mod gateway;

use std::sync::Arc;

use serde_json::Value;

use crate::error::ExecutionError;
use aws::AwsGateway;
use gateway::ClusterGateway;

/// Collaborators shared by all executors.
pub struct ExecutionContext {
    pub gateway: Arc<dyn ClusterGateway>,
    pub aws: Arc<dyn AwsGateway>,
}

/// The closed set of executable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Does nothing; exists to exercise the full pipeline end to end.
    NoOp,
    /// Restart an OpenShift workload (or delete a single pod).
    OpenshiftWorkloadRestart,
    /// Reboot an RDS instance.
    RdsReboot,
    /// Take a manual RDS snapshot.
    RdsSnapshot,
    /// Export RDS logs to a presigned download.
    RdsLogs,
    /// Flush an ElastiCache replication group.
    FlushElasticache,
}

impl Operation {
    /// Resolve a dispatch operation name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "noop" => Some(Self::NoOp),
            "openshift-workload-restart" => Some(Self::OpenshiftWorkloadRestart),
            "external-resource-rds-reboot" => Some(Self::RdsReboot),
            "external-resource-rds-snapshot" => Some(Self::RdsSnapshot),
            "external-resource-rds-logs" => Some(Self::RdsLogs),
            "external-resource-flush-elasticache" => Some(Self::FlushElasticache),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoOp => "noop",
            Self::OpenshiftWorkloadRestart => "openshift-workload-restart",
            Self::RdsReboot => "external-resource-rds-reboot",
            Self::RdsSnapshot => "external-resource-rds-snapshot",
            Self::RdsLogs => "external-resource-rds-logs",
            Self::FlushElasticache => "external-resource-flush-elasticache",
        }
    }

    /// Execute the operation with the given dispatch arguments.
    pub async fn execute(
        &self,
        args: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Option<String>, ExecutionError> {
        match self {
            Self::NoOp => Ok(None),
            Self::OpenshiftWorkloadRestart => openshift_workload_restart(args, ctx).await,
            Self::RdsReboot => rds_reboot(args, ctx).await,
            Self::RdsSnapshot => rds_snapshot(args, ctx).await,
            Self::RdsLogs => rds_logs(args, ctx).await,
            Self::FlushElasticache => flush_elasticache(args, ctx).await,
        }
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ExecutionError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutionError::terminal(format!("missing argument '{}'", key)))
}

/// Restart a workload: rolling restart for controller kinds, a plain pod
/// delete for `Pod` (the controller brings a replacement up).
async fn openshift_workload_restart(
    args: &Value,
    ctx: &ExecutionContext,
) -> Result<Option<String>, ExecutionError> {
    let cluster = required_str(args, "cluster")?;
    let namespace = required_str(args, "namespace")?;
    let kind = required_str(args, "kind")?;
    let name = required_str(args, "name")?;

    match kind {
        "Deployment" | "DaemonSet" | "StatefulSet" => {
            ctx.gateway
                .rolling_restart(cluster, namespace, kind, name)
                .await?;
            Ok(Some(format!(
                "rolling restart of {}/{} in {}/{} triggered",
                kind, name, cluster, namespace
            )))
        }
        "Pod" => {
            ctx.gateway.delete_pod(cluster, namespace, name).await?;
            Ok(Some(format!(
                "pod {} in {}/{} deleted",
                name, cluster, namespace
            )))
        }
        other => Err(ExecutionError::terminal(format!(
            "unsupported kind '{}'",
            other
        ))),
    }
}

async fn rds_reboot(
    args: &Value,
    ctx: &ExecutionContext,
) -> Result<Option<String>, ExecutionError> {
    let account = required_str(args, "account")?;
    let identifier = required_str(args, "identifier")?;
    let force_failover = args
        .get("force_failover")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    ctx.aws
        .reboot_db_instance(account, identifier, force_failover)
        .await?;
    Ok(Some(format!(
        "reboot of RDS instance {} in {} triggered",
        identifier, account
    )))
}

async fn rds_snapshot(
    args: &Value,
    ctx: &ExecutionContext,
) -> Result<Option<String>, ExecutionError> {
    let account = required_str(args, "account")?;
    let identifier = required_str(args, "identifier")?;
    let snapshot_identifier = required_str(args, "snapshot_identifier")?;

    ctx.aws
        .create_db_snapshot(account, identifier, snapshot_identifier)
        .await?;
    Ok(Some(format!(
        "snapshot {} of RDS instance {} in {} requested",
        snapshot_identifier, identifier, account
    )))
}

/// Export the instance's logs. The result message is user facing: it carries
/// the download URL, or says there was nothing to download.
async fn rds_logs(
    args: &Value,
    ctx: &ExecutionContext,
) -> Result<Option<String>, ExecutionError> {
    let account = required_str(args, "account")?;
    let identifier = required_str(args, "identifier")?;
    let s3_file_name = args.get("s3_file_name").and_then(Value::as_str);
    let expiration_days = args
        .get("expiration_days")
        .and_then(Value::as_u64)
        .unwrap_or(7) as u32;

    match ctx
        .aws
        .export_db_logs(account, identifier, s3_file_name, expiration_days)
        .await?
    {
        Some(url) => Ok(Some(format!(
            "Download the RDS logs from the following URL: {}. This link will expire in {} days.",
            url, expiration_days
        ))),
        None => Ok(Some(
            "No logs found or no logs available for download.".to_string(),
        )),
    }
}

async fn flush_elasticache(
    args: &Value,
    ctx: &ExecutionContext,
) -> Result<Option<String>, ExecutionError> {
    let account = required_str(args, "account")?;
    let identifier = required_str(args, "identifier")?;

    ctx.aws.flush_elasticache(account, identifier).await?;
    Ok(Some(format!(
        "flush of ElastiCache {} in {} triggered",
        identifier, account
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct RejectAll;

    #[async_trait]
    impl ClusterGateway for RejectAll {
        async fn rolling_restart(
            &self,
            _cluster: &str,
            _namespace: &str,
            _kind: &str,
            _name: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }

        async fn delete_pod(
            &self,
            _cluster: &str,
            _namespace: &str,
            _name: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }
    }

    #[async_trait]
    impl AwsGateway for RejectAll {
        async fn reboot_db_instance(
            &self,
            _account: &str,
            _identifier: &str,
            _force_failover: bool,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }

        async fn create_db_snapshot(
            &self,
            _account: &str,
            _identifier: &str,
            _snapshot_identifier: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }

        async fn export_db_logs(
            &self,
            _account: &str,
            _identifier: &str,
            _s3_file_name: Option<&str>,
            _expiration_days: u32,
        ) -> Result<Option<String>, ExecutionError> {
            panic!("gateway must not be called");
        }

        async fn flush_elasticache(
            &self,
            _account: &str,
            _identifier: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }
    }

    /// Gateway that records log-export requests and hands back a canned URL.
    struct CannedLogs {
        url: Option<&'static str>,
    }

    #[async_trait]
    impl ClusterGateway for CannedLogs {
        async fn rolling_restart(
            &self,
            _cluster: &str,
            _namespace: &str,
            _kind: &str,
            _name: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }

        async fn delete_pod(
            &self,
            _cluster: &str,
            _namespace: &str,
            _name: &str,
        ) -> Result<(), ExecutionError> {
            panic!("gateway must not be called");
        }
    }

    #[async_trait]
    impl AwsGateway for CannedLogs {
        async fn reboot_db_instance(
            &self,
            _account: &str,
            _identifier: &str,
            _force_failover: bool,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        async fn create_db_snapshot(
            &self,
            _account: &str,
            _identifier: &str,
            _snapshot_identifier: &str,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        async fn export_db_logs(
            &self,
            _account: &str,
            _identifier: &str,
            _s3_file_name: Option<&str>,
            _expiration_days: u32,
        ) -> Result<Option<String>, ExecutionError> {
            Ok(self.url.map(str::to_string))
        }

        async fn flush_elasticache(
            &self,
            _account: &str,
            _identifier: &str,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            gateway: Arc::new(RejectAll),
            aws: Arc::new(RejectAll),
        }
    }

    fn ctx_with_logs(url: Option<&'static str>) -> ExecutionContext {
        ExecutionContext {
            gateway: Arc::new(CannedLogs { url }),
            aws: Arc::new(CannedLogs { url }),
        }
    }

    #[test]
    fn test_operation_name_round_trip() {
        for op in [
            Operation::NoOp,
            Operation::OpenshiftWorkloadRestart,
            Operation::RdsReboot,
            Operation::RdsSnapshot,
            Operation::RdsLogs,
            Operation::FlushElasticache,
        ] {
            assert_eq!(Operation::from_name(op.name()), Some(op));
        }
        assert_eq!(Operation::from_name("reboot-the-moon"), None);
    }

    #[tokio::test]
    async fn test_no_op_returns_no_message() {
        let result = Operation::NoOp.execute(&json!({}), &ctx()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_restart_missing_argument_is_terminal() {
        let args = json!({ "cluster": "prod-1", "namespace": "payments", "kind": "Deployment" });
        let err = Operation::OpenshiftWorkloadRestart
            .execute(&args, &ctx())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("'name'"));
    }

    #[tokio::test]
    async fn test_restart_unknown_kind_is_terminal() {
        let args = json!({
            "cluster": "prod-1",
            "namespace": "payments",
            "kind": "CronJob",
            "name": "api",
        });
        let err = Operation::OpenshiftWorkloadRestart
            .execute(&args, &ctx())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("CronJob"));
    }

    #[tokio::test]
    async fn test_rds_reboot_missing_identifier_is_terminal() {
        let args = json!({ "account": "app-sre" });
        let err = Operation::RdsReboot.execute(&args, &ctx()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.message().contains("'identifier'"));
    }

    #[tokio::test]
    async fn test_rds_logs_message_carries_download_url() {
        let args = json!({
            "account": "app-sre",
            "identifier": "orders-db",
            "expiration_days": 3,
        });
        let message = Operation::RdsLogs
            .execute(&args, &ctx_with_logs(Some("https://s3.example.com/logs.zip")))
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("https://s3.example.com/logs.zip"));
        assert!(message.contains("expire in 3 days"));
    }

    #[tokio::test]
    async fn test_rds_logs_without_logs_says_so() {
        let args = json!({ "account": "app-sre", "identifier": "orders-db" });
        let message = Operation::RdsLogs
            .execute(&args, &ctx_with_logs(None))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message, "No logs found or no logs available for download.");
    }

    #[tokio::test]
    async fn test_flush_elasticache_reports_target() {
        let args = json!({ "account": "app-sre", "identifier": "orders-cache" });
        let message = Operation::FlushElasticache
            .execute(&args, &ctx_with_logs(None))
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("orders-cache"));
        assert!(message.contains("app-sre"));
    }
}
