// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker configuration loading from environment variables.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

/// Connection details for one OpenShift cluster API.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Cluster API base URL
    pub url: String,
    /// Service-account bearer token
    pub token: String,
}

/// Connection details for the automation endpoint of one AWS account.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsAccountConfig {
    /// Automation API base URL
    pub url: String,
    /// Bearer token
    pub token: String,
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Total attempts per action, first try included
    pub max_attempts: u32,
    /// Fixed delay between retry attempts
    pub retry_delay: Duration,
    /// Dispatch queue poll interval
    pub poll_interval: Duration,
    /// Dispatch lease duration; an expired lease makes the dispatch
    /// claimable again after a worker crash
    pub dispatch_lease_secs: u64,
    /// Listen address for the metrics/health endpoint
    pub metrics_addr: SocketAddr,
    /// Known clusters, keyed by the name used in restart requests
    pub clusters: HashMap<String, ClusterConfig>,
    /// Known AWS accounts, keyed by the name used in external-resource
    /// requests
    pub aws_accounts: HashMap<String, AwsAccountConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `AUTOACT_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `AUTOACT_MAX_ATTEMPTS`: attempts per action (default: 3)
    /// - `AUTOACT_RETRY_DELAY_SECS`: delay between attempts (default: 5)
    /// - `AUTOACT_POLL_INTERVAL_SECS`: queue poll interval (default: 2)
    /// - `AUTOACT_DISPATCH_LEASE_SECS`: dispatch lease (default: 300)
    /// - `AUTOACT_METRICS_PORT`: metrics/health port (default: 9090)
    /// - `AUTOACT_CLUSTERS`: JSON map of cluster name to {url, token}
    ///   (default: empty)
    /// - `AUTOACT_AWS_ACCOUNTS`: JSON map of account name to {url, token}
    ///   (default: empty)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("AUTOACT_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("AUTOACT_DATABASE_URL"))?;

        let max_attempts: u32 = std::env::var("AUTOACT_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("AUTOACT_MAX_ATTEMPTS", "must be a positive integer"))?;
        if max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "AUTOACT_MAX_ATTEMPTS",
                "must be at least 1",
            ));
        }

        let retry_delay_secs: u64 = std::env::var("AUTOACT_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_RETRY_DELAY_SECS", "must be a positive integer")
            })?;

        let poll_interval_secs: u64 = std::env::var("AUTOACT_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "2".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_POLL_INTERVAL_SECS", "must be a positive integer")
            })?;

        let dispatch_lease_secs: u64 = std::env::var("AUTOACT_DISPATCH_LEASE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_DISPATCH_LEASE_SECS", "must be a positive integer")
            })?;

        let metrics_port: u16 = std::env::var("AUTOACT_METRICS_PORT")
            .unwrap_or_else(|_| "9090".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AUTOACT_METRICS_PORT", "must be a valid port number")
            })?;

        let clusters: HashMap<String, ClusterConfig> = match std::env::var("AUTOACT_CLUSTERS") {
            Ok(raw) => serde_json::from_str(&raw).map_err(|_| {
                ConfigError::Invalid(
                    "AUTOACT_CLUSTERS",
                    "must be a JSON map of name to {url, token}",
                )
            })?,
            Err(_) => HashMap::new(),
        };

        let aws_accounts: HashMap<String, AwsAccountConfig> =
            match std::env::var("AUTOACT_AWS_ACCOUNTS") {
                Ok(raw) => serde_json::from_str(&raw).map_err(|_| {
                    ConfigError::Invalid(
                        "AUTOACT_AWS_ACCOUNTS",
                        "must be a JSON map of name to {url, token}",
                    )
                })?,
                Err(_) => HashMap::new(),
            };

        Ok(Self {
            database_url,
            max_attempts,
            retry_delay: Duration::from_secs(retry_delay_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            dispatch_lease_secs,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], metrics_port)),
            clusters,
            aws_accounts,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("AUTOACT_DATABASE_URL", "sqlite:autoact.db");
        guard.remove("AUTOACT_MAX_ATTEMPTS");
        guard.remove("AUTOACT_RETRY_DELAY_SECS");
        guard.remove("AUTOACT_POLL_INTERVAL_SECS");
        guard.remove("AUTOACT_DISPATCH_LEASE_SECS");
        guard.remove("AUTOACT_METRICS_PORT");
        guard.remove("AUTOACT_CLUSTERS");
        guard.remove("AUTOACT_AWS_ACCOUNTS");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite:autoact.db");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.dispatch_lease_secs, 300);
        assert_eq!(config.metrics_addr.port(), 9090);
        assert!(config.clusters.is_empty());
        assert!(config.aws_accounts.is_empty());
    }

    #[test]
    fn test_config_parses_aws_account_map() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("AUTOACT_DATABASE_URL", "sqlite:autoact.db");
        guard.set(
            "AUTOACT_AWS_ACCOUNTS",
            r#"{"app-sre": {"url": "https://aws-automation.example.com", "token": "aws-token"}}"#,
        );

        let config = Config::from_env().unwrap();
        let account = config.aws_accounts.get("app-sre").unwrap();
        assert_eq!(account.url, "https://aws-automation.example.com");
        assert_eq!(account.token, "aws-token");
    }

    #[test]
    fn test_config_parses_cluster_map() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("AUTOACT_DATABASE_URL", "sqlite:autoact.db");
        guard.set(
            "AUTOACT_CLUSTERS",
            r#"{"prod-1": {"url": "https://api.prod-1.example.com:6443", "token": "sa-token"}}"#,
        );

        let config = Config::from_env().unwrap();
        let cluster = config.clusters.get("prod-1").unwrap();
        assert_eq!(cluster.url, "https://api.prod-1.example.com:6443");
        assert_eq!(cluster.token, "sa-token");
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("AUTOACT_DATABASE_URL");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Missing("AUTOACT_DATABASE_URL")
        ));
    }

    #[test]
    fn test_config_rejects_zero_attempts() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("AUTOACT_DATABASE_URL", "sqlite:autoact.db");
        guard.set("AUTOACT_MAX_ATTEMPTS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Invalid("AUTOACT_MAX_ATTEMPTS", _)
        ));
    }

    #[test]
    fn test_config_rejects_malformed_cluster_map() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("AUTOACT_DATABASE_URL", "sqlite:autoact.db");
        guard.set("AUTOACT_CLUSTERS", "not json");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Invalid("AUTOACT_CLUSTERS", _)
        ));
    }
}
