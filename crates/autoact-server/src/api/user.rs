// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Current-user endpoint.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use tracing::instrument;

use autoact_core::UserRecord;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

/// GET /api/v1/me
///
/// The caller's own User record, including the cached `allowed_actions`
/// from the latest policy decision.
#[instrument(skip(state, current))]
pub async fn me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<UserRecord>, ApiError> {
    state
        .gate
        .enforce(
            state.store.as_ref(),
            &current.user,
            &current.path,
            "me",
            &BTreeMap::new(),
        )
        .await?;

    // Re-read: enforce may have refreshed allowed_actions
    let user = state
        .store
        .get_user(&current.user.email)
        .await?
        .unwrap_or(current.user);
    Ok(Json(user))
}
