// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! OpenShift workload actions.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::json;
use tracing::{info, instrument};

use autoact_core::{ActionRecord, CoreError};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

pub const WORKLOAD_RESTART: &str = "openshift-workload-restart";

/// Workload kinds the restart operation accepts.
pub const SUPPORTED_KINDS: [&str; 4] = ["Deployment", "DaemonSet", "StatefulSet", "Pod"];

/// POST /api/v1/openshift/workload-restart/{cluster}/{namespace}/{kind}/{name}
///
/// Restart an OpenShift workload: a rolling restart for controller kinds,
/// a pod delete for `Pod`.
#[instrument(skip(state, current))]
pub async fn workload_restart(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((cluster, namespace, kind, name)): Path<(String, String, String, String)>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    // 1. Policy decision with the path parameters as input
    let params = BTreeMap::from([
        ("cluster".to_string(), cluster.clone()),
        ("namespace".to_string(), namespace.clone()),
        ("kind".to_string(), kind.clone()),
        ("name".to_string(), name.clone()),
    ]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            WORKLOAD_RESTART,
            &params,
        )
        .await?;

    // 2. Reject unsupported kinds before any record is created
    if !SUPPORTED_KINDS.contains(&kind.as_str()) {
        return Err(CoreError::UnsupportedOperation {
            operation: format!("{}/{}", WORKLOAD_RESTART, kind),
        }
        .into());
    }

    // 3. Durable record first, dispatch second
    let action = state
        .store
        .create_action(WORKLOAD_RESTART, &current.user.email)
        .await?;
    info!(
        action_id = %action.action_id,
        cluster, namespace, kind, name,
        "restart requested"
    );

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            WORKLOAD_RESTART,
            &json!({
                "action_id": action.action_id,
                "cluster": cluster,
                "namespace": namespace,
                "kind": kind,
                "name": name,
            }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}
