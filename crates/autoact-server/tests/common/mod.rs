// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test helpers: in-memory state, OPA mocks, request plumbing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autoact_core::SqliteStore;
use autoact_server::auth::session::SessionSerializer;
use autoact_server::auth::token::BearerTokenAuth;
use autoact_server::config::Config;
use autoact_server::policy::PolicyGate;
use autoact_server::{AppState, build_router};

pub const BASE_URL: &str = "http://localhost:8080";
pub const TOKEN_SECRET: &str = "test-token-secret";
pub const SESSION_SECRET: &str = "test-session-secret";

pub fn test_config(opa_url: &str) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        http_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        url: BASE_URL.to_string(),
        debug: true,
        oidc_issuer: "http://localhost:8180/realms/main".to_string(),
        oidc_client_id: "autoact".to_string(),
        oidc_client_secret: "oidc-secret".to_string(),
        session_secret: SESSION_SECRET.to_string(),
        session_timeout_secs: 3600,
        token_secret: TOKEN_SECRET.to_string(),
        opa_url: opa_url.to_string(),
        authz_skip_endpoints: Vec::new(),
    }
}

/// Fresh in-memory state against the given OPA base URL, no OIDC.
pub async fn test_state(opa_url: &str) -> AppState {
    let store = SqliteStore::in_memory()
        .await
        .expect("in-memory sqlite store");
    let config = test_config(opa_url);
    AppState {
        store: Arc::new(store),
        gate: Arc::new(PolicyGate::new(opa_url, Vec::new()).expect("policy gate")),
        bearer: Arc::new(BearerTokenAuth::new(config.url.clone(), &config.token_secret)),
        sessions: Arc::new(SessionSerializer::new(
            &config.session_secret,
            config.session_timeout_secs,
        )),
        oidc: None,
        config: Arc::new(config),
    }
}

pub async fn test_app(opa_url: &str) -> (Router, AppState) {
    let state = test_state(opa_url).await;
    (build_router(state.clone()), state)
}

/// Mount an OPA decision on the mock server.
pub async fn mock_opa_decision(server: &MockServer, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/v1/data/authz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": result })))
        .mount(server)
        .await;
}

/// OPA decision that lets everything through.
pub async fn mock_opa_allow(server: &MockServer) {
    mock_opa_decision(
        server,
        json!({ "authorized": true, "within_rate_limits": true }),
    )
    .await;
}

/// Bearer token for a test identity.
pub fn bearer_for(state: &AppState, username: &str, name: &str, email: &str) -> String {
    state
        .bearer
        .create_token(username, name, email, Utc::now() + Duration::hours(1))
        .expect("mint test token")
}

/// Send one request through the router; returns status and parsed body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body")
        .to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn post(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
