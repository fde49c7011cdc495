// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! autoact API server.
//!
//! The request-handling half of autoact: resolves caller identity (bearer
//! token or OIDC session), enforces OPA policy decisions, and drives the
//! action lifecycle — create, list, inspect, cancel. Execution itself
//! happens in autoact-worker; the two processes coordinate only through
//! the store.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod policy;

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;

use autoact_core::Store;

use crate::auth::oidc::OidcClient;
use crate::auth::session::SessionSerializer;
use crate::auth::token::BearerTokenAuth;
use crate::config::Config;
use crate::policy::PolicyGate;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gate: Arc<PolicyGate>,
    pub bearer: Arc<BearerTokenAuth>,
    pub sessions: Arc<SessionSerializer>,
    /// None only when OIDC is not configured (tests); browser sessions are
    /// then rejected while bearer tokens keep working.
    pub oidc: Option<Arc<OidcClient>>,
    pub config: Arc<Config>,
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api::v1_router())
        .with_state(state)
}

/// Liveness probe; reports the serving hostname like the rest of the fleet.
async fn healthz(State(_state): State<AppState>) -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "autoact".to_string())
}
