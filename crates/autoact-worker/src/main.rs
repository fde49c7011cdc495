// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! autoact worker binary.

use std::future::IntoFuture;
use std::sync::Arc;

use tracing::{info, warn};

use autoact_core::{PostgresStore, SqliteStore, Store};
use autoact_worker::config::Config;
use autoact_worker::executors::ExecutionContext;
use autoact_worker::executors::aws::HttpAwsGateway;
use autoact_worker::executors::gateway::HttpClusterGateway;
use autoact_worker::metrics::ActionMetrics;
use autoact_worker::runtime::WorkerRuntime;
use autoact_worker::task::TaskRunner;
use autoact_worker::{MetricsState, metrics_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoact_worker=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        max_attempts = config.max_attempts,
        poll_interval_secs = config.poll_interval.as_secs(),
        metrics_addr = %config.metrics_addr,
        clusters = config.clusters.len(),
        aws_accounts = config.aws_accounts.len(),
        "Starting autoact worker"
    );

    // Connect to database and run migrations
    let store: Arc<dyn Store> = if config.database_url.starts_with("postgres") {
        Arc::new(PostgresStore::connect(&config.database_url).await?)
    } else {
        let path = config
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        Arc::new(SqliteStore::from_path(path).await?)
    };
    info!("Connected to database");

    let metrics = ActionMetrics::default();
    let ctx = ExecutionContext {
        gateway: Arc::new(HttpClusterGateway::new(config.clusters.clone())?),
        aws: Arc::new(HttpAwsGateway::new(config.aws_accounts.clone())?),
    };
    let runner = TaskRunner::new(
        store.clone(),
        metrics.clone(),
        ctx,
        config.max_attempts,
        config.retry_delay,
    );
    let runtime = WorkerRuntime::new(
        store.clone(),
        runner,
        config.poll_interval,
        config.dispatch_lease_secs,
    );
    let shutdown = runtime.shutdown_handle();

    // Observability sidecar
    let listener = tokio::net::TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics endpoint ready");
    let metrics_server = tokio::spawn(
        axum::serve(listener, metrics_router(MetricsState { store, metrics })).into_future(),
    );

    let runtime_task = tokio::spawn(runtime.run());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.notify_one();
    runtime_task.await?;
    metrics_server.abort();

    info!("autoact worker shut down");

    Ok(())
}
