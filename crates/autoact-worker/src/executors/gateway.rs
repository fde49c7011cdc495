// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster gateway: the seam between executors and the OpenShift API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::config::ClusterConfig;
use crate::error::ExecutionError;

/// Remote operations an executor can perform against a cluster.
///
/// Executors never talk HTTP themselves; they go through this trait so the
/// task framework can be exercised with a scripted gateway in tests.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Trigger a rolling restart of a Deployment, DaemonSet or StatefulSet.
    async fn rolling_restart(
        &self,
        cluster: &str,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<(), ExecutionError>;

    /// Delete a single pod; its controller recreates it.
    async fn delete_pod(
        &self,
        cluster: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), ExecutionError>;
}

/// Gateway backed by the cluster HTTP APIs from the worker configuration.
pub struct HttpClusterGateway {
    clusters: HashMap<String, ClusterConfig>,
    http: reqwest::Client,
}

impl HttpClusterGateway {
    pub fn new(clusters: HashMap<String, ClusterConfig>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { clusters, http })
    }

    fn cluster(&self, name: &str) -> Result<&ClusterConfig, ExecutionError> {
        self.clusters
            .get(name)
            .ok_or_else(|| ExecutionError::terminal(format!("unknown cluster '{}'", name)))
    }

    fn workload_path(kind: &str) -> Result<&'static str, ExecutionError> {
        match kind {
            "Deployment" => Ok("deployments"),
            "DaemonSet" => Ok("daemonsets"),
            "StatefulSet" => Ok("statefulsets"),
            other => Err(ExecutionError::terminal(format!(
                "kind '{}' does not support rolling restart",
                other
            ))),
        }
    }
}

#[async_trait]
impl ClusterGateway for HttpClusterGateway {
    async fn rolling_restart(
        &self,
        cluster: &str,
        namespace: &str,
        kind: &str,
        name: &str,
    ) -> Result<(), ExecutionError> {
        let config = self.cluster(cluster)?;
        let plural = Self::workload_path(kind)?;
        let url = format!(
            "{}/apis/apps/v1/namespaces/{}/{}/{}",
            config.url.trim_end_matches('/'),
            namespace,
            plural,
            name
        );

        // Same mechanism as `kubectl rollout restart`: bump the restartedAt
        // annotation on the pod template so the controller rolls new pods.
        let patch = json!({
            "spec": {
                "template": {
                    "metadata": {
                        "annotations": {
                            "kubectl.kubernetes.io/restartedAt": Utc::now().to_rfc3339()
                        }
                    }
                }
            }
        });

        self.http
            .patch(&url)
            .bearer_auth(&config.token)
            .header("content-type", "application/strategic-merge-patch+json")
            .json(&patch)
            .send()
            .await?
            .error_for_status()?;

        info!(cluster, namespace, kind, name, "rolling restart triggered");
        Ok(())
    }

    async fn delete_pod(
        &self,
        cluster: &str,
        namespace: &str,
        name: &str,
    ) -> Result<(), ExecutionError> {
        let config = self.cluster(cluster)?;
        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}",
            config.url.trim_end_matches('/'),
            namespace,
            name
        );

        self.http
            .delete(&url)
            .bearer_auth(&config.token)
            .send()
            .await?
            .error_for_status()?;

        info!(cluster, namespace, name, "pod deleted");
        Ok(())
    }
}
