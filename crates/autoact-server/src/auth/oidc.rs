// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! OIDC authorization-code flow for browser sessions.
//!
//! Endpoints are discovered from the issuer's well-known configuration at
//! startup. The callback wraps the IdP access token in a signed session
//! cookie; on later requests the token is introspected against the
//! userinfo endpoint rather than verified locally.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;

const SESSION_COOKIE: &str = "session";
const SCOPE: &str = "openid email profile";

/// Errors from the OIDC collaborator.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("OIDC request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OIDC discovery document is missing endpoints")]
    Discovery,

    #[error("token exchange failed with http status {0}")]
    TokenExchange(u16),

    #[error("userinfo introspection failed with http status {0}")]
    Introspection(u16),
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    userinfo_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// OIDC client bound to one issuer.
pub struct OidcClient {
    client_id: String,
    client_secret: String,
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    http: reqwest::Client,
}

impl OidcClient {
    /// Fetch the issuer's well-known configuration and build a client.
    pub async fn discover(
        issuer: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, OidcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let doc: DiscoveryDocument = http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (Some(authorization_endpoint), Some(token_endpoint), Some(userinfo_endpoint)) = (
            doc.authorization_endpoint,
            doc.token_endpoint,
            doc.userinfo_endpoint,
        ) else {
            return Err(OidcError::Discovery);
        };

        info!(issuer, "OIDC endpoints discovered");

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authorization_endpoint,
            token_endpoint,
            userinfo_endpoint,
            http,
        })
    }

    /// Build the authorization redirect URL; `next_url` rides along in
    /// `state` and becomes the post-login destination.
    pub fn authorization_url(&self, redirect_uri: &str, next_url: &str) -> String {
        format!(
            "{}?response_type=code&scope={}&client_id={}&redirect_uri={}&state={}",
            self.authorization_endpoint,
            urlencoding::encode(SCOPE),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(next_url),
        )
    }

    /// Exchange an authorization code for the IdP access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, OidcError> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OidcError::TokenExchange(response.status().as_u16()));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Check a session's access token against the userinfo endpoint. A 2xx
    /// means the IdP still vouches for the token.
    pub async fn introspect(&self, access_token: &str) -> Result<(), OidcError> {
        let response = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OidcError::Introspection(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Extract the session cookie value from request headers.
pub fn session_cookie(headers: &axum::http::HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// The redirect URI registered with the IdP.
pub fn callback_url(base_url: &str) -> String {
    format!("{}/api/v1/auth/callback", base_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next_url: String,
}

/// GET /api/v1/auth/login — redirect into the IdP authorization flow.
pub async fn login(State(state): State<AppState>, Query(query): Query<LoginQuery>) -> Response {
    let Some(oidc) = &state.oidc else {
        return (StatusCode::SERVICE_UNAVAILABLE, "OIDC is not configured").into_response();
    };
    let url = oidc.authorization_url(&callback_url(&state.config.url), &query.next_url);
    (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, url)]).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    #[serde(default)]
    pub state: String,
}

/// GET /api/v1/auth/callback — IdP redirect target. Exchanges the code,
/// seals the access token into the session cookie, and returns the caller
/// to where they started.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(oidc) = &state.oidc else {
        return (StatusCode::SERVICE_UNAVAILABLE, "OIDC is not configured").into_response();
    };

    let access_token = match oidc
        .exchange_code(&query.code, &callback_url(&state.config.url))
        .await
    {
        Ok(token) => token,
        Err(err) => {
            warn!("token exchange failed: {}", err);
            return (StatusCode::BAD_REQUEST, "Token request failed").into_response();
        }
    };

    let sealed = state.sessions.sign(&access_token);
    let secure = if state.config.debug { "" } else { "; Secure" };
    let cookie = format!(
        "{SESSION_COOKIE}={sealed}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax{secure}",
        state.config.session_timeout_secs
    );

    let next_url = if query.state.is_empty() {
        "/".to_string()
    } else {
        query.state
    };

    (
        StatusCode::TEMPORARY_REDIRECT,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, next_url),
        ],
    )
        .into_response()
}

/// GET /api/v1/auth/logout — drop the session cookie.
pub async fn logout() -> Response {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly");
    (
        StatusCode::TEMPORARY_REDIRECT,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, "/".to_string()),
        ],
    )
        .into_response()
}
