// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Policy gate backed by an OPA data endpoint.
//!
//! One decision document per request answers authorization, rate limiting,
//! and the caller's permitted operations in a single round-trip. The gate
//! fails closed: any transport error or malformed OPA answer denies the
//! request with a 500 rather than letting it through.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use autoact_core::{CoreError, Store, UserRecord};

const OPA_PACKAGE: &str = "authz";

/// Decision document returned under OPA's `result` key.
#[derive(Debug, Deserialize)]
struct Decision {
    #[serde(default)]
    authorized: bool,
    within_rate_limits: Option<bool>,
    objects: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OpaResponse {
    result: Option<Decision>,
}

/// Gate enforcing OPA decisions on every non-exempt request.
pub struct PolicyGate {
    opa_url: String,
    skip_endpoints: Vec<Regex>,
    http: reqwest::Client,
}

impl PolicyGate {
    pub fn new(opa_host: &str, skip_endpoints: Vec<Regex>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            opa_url: format!("{}/v1/data/{}", opa_host.trim_end_matches('/'), OPA_PACKAGE),
            skip_endpoints,
            http,
        })
    }

    /// Whether the request path is exempt from policy evaluation. Exempt
    /// requests never reach OPA and never touch the permission cache.
    pub fn should_skip(&self, path: &str) -> bool {
        self.skip_endpoints.iter().any(|re| re.is_match(path))
    }

    /// Enforce the policy decision for one request.
    ///
    /// `operation_id` is the stable operation identifier the policy rules
    /// key on; `params` carries the request's path and query parameters.
    #[instrument(skip(self, store, user, params), fields(user = %user.email))]
    pub async fn enforce(
        &self,
        store: &dyn Store,
        user: &UserRecord,
        path: &str,
        operation_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<(), CoreError> {
        // 1. Exempt paths short-circuit before any network traffic
        if self.should_skip(path) {
            debug!(path, "policy gate skipped");
            return Ok(());
        }

        // 2. Single decision round-trip
        let input = json!({
            "input": {
                "name": user.name,
                "username": user.username,
                "email": user.email,
                "allowed_actions": user.allowed_actions,
                "created_at": user.created_at,
                "updated_at": user.updated_at,
                "obj": operation_id,
                "params": params,
            }
        });

        let response = self
            .http
            .post(&self.opa_url)
            .json(&input)
            .send()
            .await
            .map_err(|e| CoreError::PolicyEngineError {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::PolicyEngineError {
                details: format!("OPA returned unexpected http status code: {}", status.as_u16()),
            });
        }

        let decision = response
            .json::<OpaResponse>()
            .await
            .map_err(|_| CoreError::PolicyEngineError {
                details: "OPA returned unexpected result".to_string(),
            })?
            .result
            .ok_or_else(|| CoreError::PolicyEngineError {
                details: "OPA returned unexpected result".to_string(),
            })?;

        // 3. Authorization, then rate limits; the cache stays untouched
        //    until both pass
        if !decision.authorized {
            return Err(CoreError::Unauthorized);
        }
        if decision.within_rate_limits == Some(false) {
            return Err(CoreError::RateLimited);
        }

        // 4. Refresh the cached permitted-operations list only on change
        if let Some(objects) = decision.objects
            && objects != user.allowed_actions
        {
            debug!(user = %user.email, "allowed actions changed, updating cache");
            store.set_allowed_actions(&user.email, &objects).await?;
        }

        Ok(())
    }
}
