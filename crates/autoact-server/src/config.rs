// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

/// API server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Externally visible base URL; also the bearer token issuer
    pub url: String,
    /// Debug mode (plain-http session cookies, relaxed logging)
    pub debug: bool,
    /// OIDC issuer base URL
    pub oidc_issuer: String,
    /// OIDC client id
    pub oidc_client_id: String,
    /// OIDC client secret
    pub oidc_client_secret: String,
    /// Secret key for signing session cookies
    pub session_secret: String,
    /// Session cookie lifetime in seconds
    pub session_timeout_secs: u64,
    /// Secret key for signing service-account bearer tokens
    pub token_secret: String,
    /// OPA base URL
    pub opa_url: String,
    /// Request paths exempt from the policy gate (regular expressions)
    pub authz_skip_endpoints: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `AUTOACT_DATABASE_URL`: PostgreSQL or SQLite connection string
    /// - `AUTOACT_OIDC_CLIENT_ID` / `AUTOACT_OIDC_CLIENT_SECRET`
    /// - `AUTOACT_SESSION_SECRET`: session cookie signing key
    /// - `AUTOACT_TOKEN_SECRET`: bearer token signing key
    ///
    /// Optional (with defaults):
    /// - `AUTOACT_HTTP_PORT`: HTTP listen port (default: 8080)
    /// - `AUTOACT_URL`: external base URL (default: http://localhost:8080)
    /// - `AUTOACT_DEBUG`: debug mode (default: false)
    /// - `AUTOACT_OIDC_ISSUER`: OIDC issuer URL (default: http://localhost:8180/realms/main)
    /// - `AUTOACT_SESSION_TIMEOUT_SECS`: session lifetime (default: 3600)
    /// - `AUTOACT_OPA_URL`: OPA base URL (default: http://localhost:8181)
    /// - `AUTOACT_AUTHZ_SKIP_ENDPOINTS`: comma-separated path regexes
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("AUTOACT_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("AUTOACT_DATABASE_URL"))?;

        let http_port: u16 = std::env::var("AUTOACT_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_HTTP_PORT", "must be a valid port number")
            })?;

        let url =
            std::env::var("AUTOACT_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let debug = std::env::var("AUTOACT_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let oidc_issuer = std::env::var("AUTOACT_OIDC_ISSUER")
            .unwrap_or_else(|_| "http://localhost:8180/realms/main".to_string());
        let oidc_client_id = std::env::var("AUTOACT_OIDC_CLIENT_ID")
            .map_err(|_| ConfigError::Missing("AUTOACT_OIDC_CLIENT_ID"))?;
        let oidc_client_secret = std::env::var("AUTOACT_OIDC_CLIENT_SECRET")
            .map_err(|_| ConfigError::Missing("AUTOACT_OIDC_CLIENT_SECRET"))?;

        let session_secret = std::env::var("AUTOACT_SESSION_SECRET")
            .map_err(|_| ConfigError::Missing("AUTOACT_SESSION_SECRET"))?;
        let session_timeout_secs: u64 = std::env::var("AUTOACT_SESSION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_SESSION_TIMEOUT_SECS", "must be a positive integer")
            })?;

        let token_secret = std::env::var("AUTOACT_TOKEN_SECRET")
            .map_err(|_| ConfigError::Missing("AUTOACT_TOKEN_SECRET"))?;

        let opa_url = std::env::var("AUTOACT_OPA_URL")
            .unwrap_or_else(|_| "http://localhost:8181".to_string());

        let authz_skip_endpoints = std::env::var("AUTOACT_AUTHZ_SKIP_ENDPOINTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            url,
            debug,
            oidc_issuer,
            oidc_client_id,
            oidc_client_secret,
            session_secret,
            session_timeout_secs,
            token_secret,
            opa_url,
            authz_skip_endpoints,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
