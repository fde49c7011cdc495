// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution error taxonomy for the task framework.

use std::fmt;

/// An error raised while executing an operation.
///
/// The class decides retry behaviour: `Transient` errors are retried up to
/// the configured attempt budget, `Terminal` errors fail the action on the
/// spot. Classification happens where the error is raised (the gateway for
/// HTTP failures, the executor for validation failures); the task loop only
/// consults [`is_retryable`](Self::is_retryable).
#[derive(Debug)]
pub enum ExecutionError {
    /// A failure that may resolve on its own: network timeouts, connection
    /// errors, upstream 5xx responses.
    Transient(String),
    /// A failure that retrying cannot fix: bad arguments, unknown targets,
    /// upstream 4xx responses.
    Terminal(String),
}

impl ExecutionError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }

    /// Whether the task loop should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// The failure message recorded as the action result.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Terminal(m) => m,
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(m) => write!(f, "transient: {}", m),
            Self::Terminal(m) => write!(f, "terminal: {}", m),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Map a reqwest error to an execution error class.
///
/// Timeouts and connect failures are worth retrying; a status error takes
/// its class from the status code (5xx transient, 4xx terminal).
impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.is_server_error() {
                Self::Transient(format!("upstream returned {}", status))
            } else {
                Self::Terminal(format!("upstream returned {}", status))
            }
        } else if err.is_timeout() || err.is_connect() {
            Self::Transient(err.to_string())
        } else {
            Self::Terminal(err.to_string())
        }
    }
}
