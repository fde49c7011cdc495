// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External resource actions: RDS and ElastiCache maintenance, addressed
//! by AWS account and resource identifier.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use autoact_core::{ActionRecord, CoreError};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

pub const RDS_REBOOT: &str = "external-resource-rds-reboot";
pub const RDS_SNAPSHOT: &str = "external-resource-rds-snapshot";
pub const RDS_LOGS: &str = "external-resource-rds-logs";
pub const FLUSH_ELASTICACHE: &str = "external-resource-flush-elasticache";

#[derive(Debug, Deserialize)]
pub struct RdsRebootQuery {
    #[serde(default)]
    pub force_failover: bool,
}

#[derive(Debug, Deserialize)]
pub struct RdsLogsQuery {
    #[serde(default = "default_expiration_days")]
    pub expiration_days: u32,
    pub s3_file_name: Option<String>,
}

fn default_expiration_days() -> u32 {
    7
}

/// POST /api/v1/external-resource/rds-reboot/{account}/{identifier}
#[instrument(skip(state, current))]
pub async fn rds_reboot(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((account, identifier)): Path<(String, String)>,
    Query(query): Query<RdsRebootQuery>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    let params = BTreeMap::from([
        ("account".to_string(), account.clone()),
        ("identifier".to_string(), identifier.clone()),
        ("force_failover".to_string(), query.force_failover.to_string()),
    ]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            RDS_REBOOT,
            &params,
        )
        .await?;

    let action = state
        .store
        .create_action(RDS_REBOOT, &current.user.email)
        .await?;
    info!(
        action_id = %action.action_id,
        account, identifier,
        force_failover = query.force_failover,
        "RDS reboot requested"
    );

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            RDS_REBOOT,
            &json!({
                "action_id": action.action_id,
                "account": account,
                "identifier": identifier,
                "force_failover": query.force_failover,
            }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}

/// POST /api/v1/external-resource/rds-snapshot/{account}/{identifier}/{snapshot_identifier}
#[instrument(skip(state, current))]
pub async fn rds_snapshot(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((account, identifier, snapshot_identifier)): Path<(String, String, String)>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    let params = BTreeMap::from([
        ("account".to_string(), account.clone()),
        ("identifier".to_string(), identifier.clone()),
        (
            "snapshot_identifier".to_string(),
            snapshot_identifier.clone(),
        ),
    ]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            RDS_SNAPSHOT,
            &params,
        )
        .await?;

    let action = state
        .store
        .create_action(RDS_SNAPSHOT, &current.user.email)
        .await?;
    info!(
        action_id = %action.action_id,
        account, identifier, snapshot_identifier,
        "RDS snapshot requested"
    );

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            RDS_SNAPSHOT,
            &json!({
                "action_id": action.action_id,
                "account": account,
                "identifier": identifier,
                "snapshot_identifier": snapshot_identifier,
            }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}

/// POST /api/v1/external-resource/rds-logs/{account}/{identifier}
///
/// Export the instance's logs to a presigned download; the link lifetime
/// is capped at a week.
#[instrument(skip(state, current))]
pub async fn rds_logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((account, identifier)): Path<(String, String)>,
    Query(query): Query<RdsLogsQuery>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    if !(1..=7).contains(&query.expiration_days) {
        return Err(CoreError::ValidationError {
            field: "expiration_days".to_string(),
            message: "must be between 1 and 7".to_string(),
        }
        .into());
    }

    let mut params = BTreeMap::from([
        ("account".to_string(), account.clone()),
        ("identifier".to_string(), identifier.clone()),
        (
            "expiration_days".to_string(),
            query.expiration_days.to_string(),
        ),
    ]);
    if let Some(name) = &query.s3_file_name {
        params.insert("s3_file_name".to_string(), name.clone());
    }
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            RDS_LOGS,
            &params,
        )
        .await?;

    let action = state
        .store
        .create_action(RDS_LOGS, &current.user.email)
        .await?;
    info!(
        action_id = %action.action_id,
        account, identifier,
        expiration_days = query.expiration_days,
        "RDS log export requested"
    );

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            RDS_LOGS,
            &json!({
                "action_id": action.action_id,
                "account": account,
                "identifier": identifier,
                "s3_file_name": query.s3_file_name,
                "expiration_days": query.expiration_days,
            }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}

/// POST /api/v1/external-resource/flush-elasticache/{account}/{identifier}
#[instrument(skip(state, current))]
pub async fn flush_elasticache(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((account, identifier)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ActionRecord>), ApiError> {
    let params = BTreeMap::from([
        ("account".to_string(), account.clone()),
        ("identifier".to_string(), identifier.clone()),
    ]);
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            FLUSH_ELASTICACHE,
            &params,
        )
        .await?;

    let action = state
        .store
        .create_action(FLUSH_ELASTICACHE, &current.user.email)
        .await?;
    info!(
        action_id = %action.action_id,
        account, identifier,
        "ElastiCache flush requested"
    );

    state
        .store
        .enqueue_dispatch(
            &action.action_id,
            FLUSH_ELASTICACHE,
            &json!({
                "action_id": action.action_id,
                "account": account,
                "identifier": identifier,
            }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(action)))
}
