// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for autoact-core.
//!
//! Provides the request-path error taxonomy. Errors raised while handling a
//! request are returned synchronously and never create or mutate an action;
//! errors raised during asynchronous execution are recorded on the action
//! record instead (see autoact-worker).

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during request processing.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Action or user record was not found.
    NotFound {
        /// Entity kind, e.g. "action" or "user".
        kind: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// The policy engine denied the request.
    Unauthorized,

    /// The policy engine allowed the request but the caller exceeded the
    /// configured rate limits.
    RateLimited,

    /// The requested operation kind is not recognized by this deployment.
    UnsupportedOperation {
        /// The unknown operation identifier.
        operation: String,
    },

    /// Input validation failed before any record was created.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// The policy decision point was unreachable or returned a malformed
    /// response. Always fails closed.
    PolicyEngineError {
        /// What went wrong.
        details: String,
    },

    /// Database operation failed.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Shorthand for a not-found action.
    pub fn action_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "action",
            id: id.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::PolicyEngineError { .. } => "POLICY_ENGINE_ERROR",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
        }
    }

    /// HTTP status code this error surfaces as.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Unauthorized => 401,
            Self::RateLimited => 429,
            Self::UnsupportedOperation { .. } => 400,
            Self::ValidationError { .. } => 422,
            Self::PolicyEngineError { .. } | Self::DatabaseError { .. } => 500,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => {
                write!(f, "{} '{}' not found", kind, id)
            }
            Self::Unauthorized => write!(f, "Not authorized"),
            Self::RateLimited => write!(f, "Action rate limit exceeded"),
            Self::UnsupportedOperation { operation } => {
                write!(f, "Operation '{}' is not supported", operation)
            }
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::PolicyEngineError { details } => {
                write!(f, "Policy engine error: {}", details)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}
