// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API surface, mounted under `/api/v1`.

pub mod actions;
pub mod admin;
pub mod external_resource;
pub mod openshift;
pub mod user;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;
use crate::auth::oidc;

/// All v1 routes. Identity resolution happens via the [`CurrentUser`]
/// extractor on each gated handler; the OIDC routes are the only
/// credential-free endpoints here.
///
/// [`CurrentUser`]: crate::auth::CurrentUser
pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/actions/no-op", post(actions::no_op))
        .route(
            "/openshift/workload-restart/{cluster}/{namespace}/{kind}/{name}",
            post(openshift::workload_restart),
        )
        .route(
            "/external-resource/rds-reboot/{account}/{identifier}",
            post(external_resource::rds_reboot),
        )
        .route(
            "/external-resource/rds-snapshot/{account}/{identifier}/{snapshot_identifier}",
            post(external_resource::rds_snapshot),
        )
        .route(
            "/external-resource/rds-logs/{account}/{identifier}",
            post(external_resource::rds_logs),
        )
        .route(
            "/external-resource/flush-elasticache/{account}/{identifier}",
            post(external_resource::flush_elasticache),
        )
        .route("/actions", get(actions::list))
        .route(
            "/actions/{action_id}",
            get(actions::detail).post(actions::cancel),
        )
        .route("/me", get(user::me))
        .route("/admin/token", post(admin::create_token))
        .route("/auth/login", get(oidc::login))
        .route("/auth/callback", get(oidc::callback))
        .route("/auth/logout", get(oidc::logout))
}
