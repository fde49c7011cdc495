// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admin endpoints.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use autoact_core::CoreError;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTokenParam {
    pub name: String,
    pub username: String,
    pub email: String,
    pub expiration: DateTime<Utc>,
}

/// POST /api/v1/admin/token
///
/// Mint a bearer token for a service account.
#[instrument(skip(state, current, param))]
pub async fn create_token(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(param): Json<CreateTokenParam>,
) -> Result<Json<String>, ApiError> {
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            "create-token",
            &BTreeMap::new(),
        )
        .await?;

    info!(
        service_account = %param.username,
        requested_by = %current.user.email,
        "minting service-account token"
    );

    let token = state
        .bearer
        .create_token(&param.username, &param.name, &param.email, param.expiration)
        .map_err(|e| CoreError::ValidationError {
            field: "expiration".to_string(),
            message: e.to_string(),
        })?;

    Ok(Json(token))
}
