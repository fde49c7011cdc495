// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record types shared by the API server and the worker.
//!
//! Timestamps are floating-point epoch seconds: that is what the store
//! persists and what the API serializes, so there is no conversion layer.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current epoch time as floating-point seconds.
pub fn epoch_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Lifecycle status of an action.
///
/// `Pending` is assigned at creation, before dispatch. The worker moves an
/// action to `Running` on every attempt and records exactly one terminal
/// outcome (`Success` or `Failure`). `Cancelled` is a request-driven
/// override reachable from `Pending` or `Running` only; the worker never
/// applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    /// Created, not yet picked up by a worker.
    Pending,
    /// An execution attempt is in flight.
    Running,
    /// Terminal: the executor finished successfully.
    Success,
    /// Terminal: attempts are exhausted or the error was not retryable.
    Failure,
    /// Terminal: cancelled by an explicit request, never by the worker.
    Cancelled,
}

impl ActionStatus {
    /// Stable string form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no further transitions are permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Cancelled)
    }

    /// Whether the edge `self -> next` exists in the lifecycle state machine.
    /// SUCCESS and FAILURE are only reachable through RUNNING.
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            // Re-applying RUNNING is legal: every retry attempt does it.
            Self::Running => matches!(
                next,
                Self::Running | Self::Success | Self::Failure | Self::Cancelled
            ),
            Self::Success | Self::Failure | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown action status '{other}'")),
        }
    }
}

/// A durable record of one invocation of a privileged operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Opaque unique identifier, generated at creation, immutable.
    pub action_id: String,
    /// Operation kind, e.g. "openshift-workload-restart".
    pub name: String,
    /// Identity key (email) of the requesting user, immutable.
    pub owner: String,
    /// Current lifecycle status.
    pub status: ActionStatus,
    /// Free-text outcome message, set only on the terminal transition.
    pub result: Option<String>,
    /// Snapshot of the execution parameters used for this invocation,
    /// excluding the action reference itself. For diagnostics only.
    pub task_args: Option<serde_json::Value>,
    /// Epoch seconds at creation.
    pub created_at: f64,
    /// Epoch seconds of the last mutation.
    pub updated_at: f64,
}

/// A resolved identity, created or refreshed on successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Globally unique identity key.
    pub email: String,
    /// Short login name from the identity provider.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Cached, advisory list of operation identifiers the policy engine
    /// currently grants. Introspection only, never used for enforcement.
    pub allowed_actions: Vec<String>,
    /// Epoch seconds at creation.
    pub created_at: f64,
    /// Epoch seconds of the last mutation.
    pub updated_at: f64,
}

/// A pending unit of work for the worker process, keyed by action id so a
/// single logical invocation is dispatched at most once.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// The action this dispatch executes. Primary key.
    pub action_id: String,
    /// Executor name, e.g. "noop".
    pub operation: String,
    /// Execution arguments, including the action reference under "action_id".
    pub args: serde_json::Value,
    /// Epoch seconds when a worker last claimed this dispatch. A claim older
    /// than the lease interval may be re-claimed (at-least-once redelivery).
    pub claimed_at: Option<f64>,
    /// Epoch seconds when the dispatch was enqueued.
    pub created_at: f64,
}
