// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! AWS gateway: the seam between executors and the per-account automation
//! endpoints that front RDS and ElastiCache.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::AwsAccountConfig;
use crate::error::ExecutionError;

/// Remote operations an executor can perform against an AWS account.
///
/// Like the cluster gateway, executors never talk HTTP themselves; the task
/// framework is exercised with a scripted gateway in tests.
#[async_trait]
pub trait AwsGateway: Send + Sync {
    /// Reboot an RDS instance, optionally forcing a failover.
    async fn reboot_db_instance(
        &self,
        account: &str,
        identifier: &str,
        force_failover: bool,
    ) -> Result<(), ExecutionError>;

    /// Take a manual snapshot of an RDS instance.
    async fn create_db_snapshot(
        &self,
        account: &str,
        identifier: &str,
        snapshot_identifier: &str,
    ) -> Result<(), ExecutionError>;

    /// Bundle the instance's logs into an object store archive and return a
    /// presigned download URL. `None` means the instance has no logs.
    async fn export_db_logs(
        &self,
        account: &str,
        identifier: &str,
        s3_file_name: Option<&str>,
        expiration_days: u32,
    ) -> Result<Option<String>, ExecutionError>;

    /// Flush all keys of an ElastiCache replication group.
    async fn flush_elasticache(
        &self,
        account: &str,
        identifier: &str,
    ) -> Result<(), ExecutionError>;
}

#[derive(Debug, Deserialize)]
struct LogExportResponse {
    download_url: Option<String>,
}

/// Gateway backed by the account automation HTTP APIs from the worker
/// configuration.
pub struct HttpAwsGateway {
    accounts: HashMap<String, AwsAccountConfig>,
    http: reqwest::Client,
}

impl HttpAwsGateway {
    pub fn new(accounts: HashMap<String, AwsAccountConfig>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { accounts, http })
    }

    fn account(&self, name: &str) -> Result<&AwsAccountConfig, ExecutionError> {
        self.accounts
            .get(name)
            .ok_or_else(|| ExecutionError::terminal(format!("unknown AWS account '{}'", name)))
    }
}

#[async_trait]
impl AwsGateway for HttpAwsGateway {
    async fn reboot_db_instance(
        &self,
        account: &str,
        identifier: &str,
        force_failover: bool,
    ) -> Result<(), ExecutionError> {
        let config = self.account(account)?;
        let url = format!(
            "{}/rds/instances/{}/reboot",
            config.url.trim_end_matches('/'),
            identifier
        );

        self.http
            .post(&url)
            .bearer_auth(&config.token)
            .json(&json!({ "force_failover": force_failover }))
            .send()
            .await?
            .error_for_status()?;

        info!(account, identifier, force_failover, "RDS reboot triggered");
        Ok(())
    }

    async fn create_db_snapshot(
        &self,
        account: &str,
        identifier: &str,
        snapshot_identifier: &str,
    ) -> Result<(), ExecutionError> {
        let config = self.account(account)?;
        let url = format!(
            "{}/rds/instances/{}/snapshots",
            config.url.trim_end_matches('/'),
            identifier
        );

        self.http
            .post(&url)
            .bearer_auth(&config.token)
            .json(&json!({ "snapshot_identifier": snapshot_identifier }))
            .send()
            .await?
            .error_for_status()?;

        info!(account, identifier, snapshot_identifier, "RDS snapshot requested");
        Ok(())
    }

    async fn export_db_logs(
        &self,
        account: &str,
        identifier: &str,
        s3_file_name: Option<&str>,
        expiration_days: u32,
    ) -> Result<Option<String>, ExecutionError> {
        let config = self.account(account)?;
        let url = format!(
            "{}/rds/instances/{}/log-exports",
            config.url.trim_end_matches('/'),
            identifier
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.token)
            .json(&json!({
                "s3_file_name": s3_file_name,
                "expiration_days": expiration_days,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: LogExportResponse = response.json().await.map_err(|e| {
            ExecutionError::terminal(format!("malformed log export response: {}", e))
        })?;

        info!(
            account,
            identifier,
            exported = body.download_url.is_some(),
            "RDS log export finished"
        );
        Ok(body.download_url)
    }

    async fn flush_elasticache(
        &self,
        account: &str,
        identifier: &str,
    ) -> Result<(), ExecutionError> {
        let config = self.account(account)?;
        let url = format!(
            "{}/elasticache/{}/flush",
            config.url.trim_end_matches('/'),
            identifier
        );

        self.http
            .post(&url)
            .bearer_auth(&config.token)
            .send()
            .await?
            .error_for_status()?;

        info!(account, identifier, "ElastiCache flush triggered");
        Ok(())
    }
}
