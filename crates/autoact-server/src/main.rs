// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! autoact API server binary.

use std::sync::Arc;

use regex::Regex;
use tracing::{info, warn};

use autoact_core::{PostgresStore, SqliteStore, Store};
use autoact_server::auth::oidc::OidcClient;
use autoact_server::auth::session::SessionSerializer;
use autoact_server::auth::token::BearerTokenAuth;
use autoact_server::config::Config;
use autoact_server::policy::PolicyGate;
use autoact_server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoact_server=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        url = %config.url,
        opa_url = %config.opa_url,
        "Starting autoact server"
    );

    // Connect to database and run migrations
    let store: Arc<dyn Store> = if config.database_url.starts_with("postgres") {
        Arc::new(PostgresStore::connect(&config.database_url).await?)
    } else {
        let path = config
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        Arc::new(SqliteStore::from_path(path).await?)
    };
    info!("Connected to database");

    // Policy gate
    let skip_endpoints = config
        .authz_skip_endpoints
        .iter()
        .map(|s| Regex::new(s))
        .collect::<Result<Vec<_>, _>>()?;
    let gate = Arc::new(PolicyGate::new(&config.opa_url, skip_endpoints)?);

    // Auth components
    let bearer = Arc::new(BearerTokenAuth::new(
        config.url.clone(),
        &config.token_secret,
    ));
    let sessions = Arc::new(SessionSerializer::new(
        &config.session_secret,
        config.session_timeout_secs,
    ));
    let oidc = Arc::new(
        OidcClient::discover(
            &config.oidc_issuer,
            &config.oidc_client_id,
            &config.oidc_client_secret,
        )
        .await?,
    );
    info!("Auth components initialized");

    let state = AppState {
        store,
        gate,
        bearer,
        sessions,
        oidc: Some(oidc),
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "API server ready");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    info!("autoact server shut down");

    Ok(())
}
