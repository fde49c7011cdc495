// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Action lifecycle endpoints: create (no-op), list, detail, cancel.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use autoact_core::{ActionRecord, ActionStatus};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

pub const NO_OP: &str = "noop";

/// POST /api/v1/actions/no-op
///
/// Creates an action that performs no actual operation. Used for testing
/// the full create/dispatch/execute/finalize path.
#[instrument(skip(state, current))]
pub async fn no_op(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    // 1. Policy decision before any record exists
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            NO_OP,
            &BTreeMap::new(),
        )
        .await?;

    // 2. Durable record first, dispatch second
    let action = state.store.create_action(NO_OP, &current.user.email).await?;
    info!(action_id = %action.action_id, "{}: action created", NO_OP);

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            NO_OP,
            &json!({ "action_id": action.action_id }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}

#[derive(Debug, Deserialize)]
pub struct ActionListQuery {
    /// Filter actions by their status
    pub status: Option<ActionStatus>,
    /// Exclude actions last updated more than this many minutes ago
    pub max_age_minutes: Option<u64>,
    /// List another user's actions instead of the caller's
    pub user: Option<String>,
}

/// GET /api/v1/actions
#[instrument(skip(state, current))]
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<ActionListQuery>,
) -> Result<Json<Vec<ActionRecord>>, ApiError> {
    // 1. Policy decision with the query parameters as input
    let mut params = BTreeMap::new();
    if let Some(status) = query.status {
        params.insert("status".to_string(), status.as_str().to_string());
    }
    if let Some(minutes) = query.max_age_minutes {
        params.insert("max_age_minutes".to_string(), minutes.to_string());
    }
    if let Some(user) = &query.user {
        params.insert("user".to_string(), user.clone());
    }
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            "action-list",
            &params,
        )
        .await?;

    // 2. Owner-scoped query; the policy decides whether the override is allowed
    let owner = query.user.as_deref().unwrap_or(&current.user.email);
    let max_age_seconds = query.max_age_minutes.map(|m| m.saturating_mul(60));
    let actions = state
        .store
        .list_actions_by_owner(owner, query.status, max_age_seconds)
        .await?;

    Ok(Json(actions))
}

/// GET /api/v1/actions/{action_id}
#[instrument(skip(state, current))]
pub async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(action_id): Path<String>,
) -> Result<Json<ActionRecord>, ApiError> {
    let params = BTreeMap::from([("action_id".to_string(), action_id.clone())]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            "action-detail",
            &params,
        )
        .await?;

    let action = state.store.get_action_or_fail(&action_id).await?;
    Ok(Json(action))
}

/// POST /api/v1/actions/{action_id}
///
/// Cancels a pending or running action. Cancellation is advisory: a
/// dispatch already executing runs to completion, and an action that
/// reached a terminal state first is returned unchanged.
#[instrument(skip(state, current))]
pub async fn cancel(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(action_id): Path<String>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    let params = BTreeMap::from([("action_id".to_string(), action_id.clone())]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            "action-cancel",
            &params,
        )
        .await?;

    let action = state.store.cancel_action(&action_id).await?;
    info!(action_id = %action.action_id, status = %action.status, "cancel requested");

    Ok((StatusCode::ACCEPTED, Json(action)))
}
