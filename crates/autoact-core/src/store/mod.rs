// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Store interfaces and backends for autoact-core.
//!
//! This module defines the durable store abstraction and backend
//! implementations. The store exclusively owns persistence of actions,
//! users, and the dispatch queue; the API server and the worker coordinate
//! only through it.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresStore;
pub use self::sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{ActionRecord, ActionStatus, DispatchRecord, UserRecord};

/// Raw action row as stored; status and task_args are decoded afterwards.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ActionRow {
    pub action_id: String,
    pub name: String,
    pub owner: String,
    pub status: String,
    pub result: Option<String>,
    pub task_args: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
}

impl ActionRow {
    pub(crate) fn into_record(self) -> Result<ActionRecord, CoreError> {
        let status: ActionStatus =
            self.status
                .parse()
                .map_err(|message: String| CoreError::DatabaseError {
                    operation: "decode".to_string(),
                    details: message,
                })?;
        let task_args = match self.task_args {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        Ok(ActionRecord {
            action_id: self.action_id,
            name: self.name,
            owner: self.owner,
            status,
            result: self.result,
            task_args,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw user row; allowed_actions is stored as a JSON array in text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub email: String,
    pub username: String,
    pub name: String,
    pub allowed_actions: String,
    pub created_at: f64,
    pub updated_at: f64,
}

impl UserRow {
    pub(crate) fn into_record(self) -> Result<UserRecord, CoreError> {
        let allowed_actions: Vec<String> = serde_json::from_str(&self.allowed_actions)?;
        Ok(UserRecord {
            email: self.email,
            username: self.username,
            name: self.name,
            allowed_actions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Raw dispatch row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DispatchRow {
    pub action_id: String,
    pub operation: String,
    pub args: String,
    pub claimed_at: Option<f64>,
    pub created_at: f64,
}

impl DispatchRow {
    pub(crate) fn into_record(self) -> Result<DispatchRecord, CoreError> {
        let args = serde_json::from_str(&self.args)?;
        Ok(DispatchRecord {
            action_id: self.action_id,
            operation: self.operation,
            args,
            claimed_at: self.claimed_at,
            created_at: self.created_at,
        })
    }
}

/// Durable store used by the API server and the worker.
///
/// Every mutation bumps `updated_at`. There is no cross-process locking;
/// the terminal-state writes (`finalize_action`, `cancel_action`) use
/// conditional updates so that exactly one terminal transition is ever
/// recorded per action, whichever writer gets there first.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a new action: fresh UUID, both timestamps now, status PENDING.
    async fn create_action(&self, name: &str, owner: &str) -> Result<ActionRecord, CoreError>;

    /// Fetch an action by id.
    async fn get_action(&self, action_id: &str) -> Result<Option<ActionRecord>, CoreError>;

    /// Fetch an action by id, failing with NotFound if absent.
    async fn get_action_or_fail(&self, action_id: &str) -> Result<ActionRecord, CoreError> {
        self.get_action(action_id)
            .await?
            .ok_or_else(|| CoreError::action_not_found(action_id))
    }

    /// Set the action status. Fails with NotFound for an unknown id.
    ///
    /// This is the worker's per-attempt RUNNING write; it may be re-applied
    /// on every retry attempt. The write only applies while the action is
    /// still PENDING or RUNNING. Returns whether it was applied; `false`
    /// means the action reached a terminal state first (for example a
    /// cancel that landed between attempts) and the caller must stop.
    async fn set_action_status(
        &self,
        action_id: &str,
        status: ActionStatus,
    ) -> Result<bool, CoreError>;

    /// Record the terminal outcome of an execution: status (SUCCESS or
    /// FAILURE), result message, and the task_args snapshot.
    ///
    /// The write is conditional on the action not already being terminal.
    /// Returns whether it was applied; `false` means another writer (for
    /// example a racing cancel) recorded the terminal state first.
    async fn finalize_action(
        &self,
        action_id: &str,
        status: ActionStatus,
        result: &str,
        task_args: &serde_json::Value,
    ) -> Result<bool, CoreError>;

    /// Cancel an action. Only PENDING or RUNNING actions transition;
    /// cancelling an already-terminal action is a no-op. Returns the record
    /// after the attempt. Fails with NotFound for an unknown id.
    async fn cancel_action(&self, action_id: &str) -> Result<ActionRecord, CoreError>;

    /// List actions for an owner, newest update first.
    ///
    /// Filter semantics: no filters returns all of the owner's actions;
    /// `max_age_seconds` restricts to `updated_at >= now - max_age_seconds`;
    /// `status` restricts to that status; both filters are a conjunction.
    /// Queries are always owner-scoped, never a cross-owner scan.
    async fn list_actions_by_owner(
        &self,
        owner: &str,
        status: Option<ActionStatus>,
        max_age_seconds: Option<u64>,
    ) -> Result<Vec<ActionRecord>, CoreError>;

    /// Create or refresh a user on identity resolution. An existing record
    /// only gets a write when name or username actually changed.
    async fn upsert_user(
        &self,
        email: &str,
        name: &str,
        username: &str,
    ) -> Result<UserRecord, CoreError>;

    /// Fetch a user by identity key.
    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, CoreError>;

    /// Overwrite the cached allowed-actions list. The policy gate only
    /// calls this when the decision differs from the cached value.
    async fn set_allowed_actions(&self, email: &str, actions: &[String]) -> Result<(), CoreError>;

    /// Enqueue a dispatch for the worker. Keyed by action id: enqueueing the
    /// same action twice is a no-op, guaranteeing dispatch-once-per-action.
    async fn enqueue_dispatch(
        &self,
        action_id: &str,
        operation: &str,
        args: &serde_json::Value,
    ) -> Result<(), CoreError>;

    /// Claim the oldest dispatch whose lease is free or expired, marking it
    /// claimed now. Returns None when the queue is empty. A dispatch whose
    /// worker crashed becomes claimable again after `lease_seconds`
    /// (at-least-once redelivery).
    async fn claim_dispatch(&self, lease_seconds: u64)
    -> Result<Option<DispatchRecord>, CoreError>;

    /// Remove a completed dispatch from the queue.
    async fn complete_dispatch(&self, action_id: &str) -> Result<(), CoreError>;

    /// Check database connectivity.
    async fn health_check(&self) -> Result<bool, CoreError>;
}
