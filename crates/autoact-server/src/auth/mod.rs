// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity resolution for API requests.
//!
//! Every gated request resolves to a durable User record, in this order:
//!
//! 1. `Authorization: Bearer <jwt>` — an HS256 service-account token minted
//!    by this server. An invalid or expired token falls through to 2.
//! 2. Session cookie — a signed wrapper around an IdP access token, checked
//!    against the userinfo endpoint.
//! 3. Neither — 307 redirect into the OIDC login flow.
//!
//! Resolution upserts the User, so the record always carries the identity
//! attributes from the latest successful authentication.

pub mod oidc;
pub mod session;
pub mod token;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use tracing::warn;

use autoact_core::UserRecord;

use crate::AppState;
use crate::error::ApiError;

/// The authenticated user for the current request, plus the request path
/// for the policy gate's skip check.
pub struct CurrentUser {
    pub user: UserRecord,
    pub path: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();

        // 1. Bearer token. Any header that is not a usable Bearer token is
        // logged and ignored so the session cookie still gets a chance.
        if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
            match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
                Some(token) => match state.bearer.verify(token) {
                    Ok(claims) => {
                        let user = state
                            .store
                            .upsert_user(&claims.email, &claims.name, &claims.preferred_username)
                            .await?;
                        return Ok(Self { user, path });
                    }
                    Err(err) => {
                        warn!("bearer token rejected: {}", err);
                    }
                },
                None => {
                    warn!("authorization header without a bearer scheme, ignoring");
                }
            }
        }

        // 2. Session cookie
        if let Some(cookie) = oidc::session_cookie(&parts.headers) {
            match resolve_session(state, &cookie).await {
                Ok(user) => return Ok(Self { user, path }),
                Err(err) => warn!("session rejected: {}", err),
            }
        }

        // 3. Not authenticated: into the login flow, back here afterwards.
        let next_url = format!(
            "{}{}",
            state.config.url.trim_end_matches('/'),
            parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/")
        );
        Err(ApiError::LoginRedirect(format!(
            "{}/api/v1/auth/login?next_url={}",
            state.config.url.trim_end_matches('/'),
            urlencoding::encode(&next_url)
        )))
    }
}

/// Unseal the session cookie, introspect the access token, and upsert the
/// user from its claims.
async fn resolve_session(state: &AppState, cookie: &str) -> Result<UserRecord, ApiError> {
    let access_token = state
        .sessions
        .verify(cookie)
        .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    let oidc = state
        .oidc
        .as_ref()
        .ok_or_else(|| ApiError::unauthenticated("OIDC is not configured"))?;
    oidc.introspect(&access_token)
        .await
        .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    let claims = token::decode_unverified(&access_token)
        .map_err(|e| ApiError::unauthenticated(e.to_string()))?;

    Ok(state
        .store
        .upsert_user(&claims.email, &claims.name, &claims.preferred_username)
        .await?)
}
