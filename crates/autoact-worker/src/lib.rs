// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! autoact worker: executes dispatched actions with bounded retry.
//!
//! The worker polls the dispatch queue, resolves each dispatch to an
//! operation executor, and drives the action record through its lifecycle:
//! RUNNING on every attempt, SUCCESS or FAILURE exactly once at the end.
//! An axum sidecar endpoint serves Prometheus metrics and a health check.

pub mod config;
pub mod error;
pub mod executors;
pub mod metrics;
pub mod runtime;
pub mod task;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

use autoact_core::Store;

use metrics::ActionMetrics;

/// Shared state for the metrics/health endpoint.
#[derive(Clone)]
pub struct MetricsState {
    pub store: Arc<dyn Store>,
    pub metrics: ActionMetrics,
}

/// Router for the worker's observability endpoint.
pub fn metrics_router(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn render_metrics(State(state): State<MetricsState>) -> String {
    state.metrics.render_prometheus()
}

async fn healthz(State(state): State<MetricsState>) -> (StatusCode, &'static str) {
    match state.store.health_check().await {
        Ok(true) => (StatusCode::OK, "ok"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "database unreachable"),
    }
}
