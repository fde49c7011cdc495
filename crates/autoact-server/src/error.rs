// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! API error responses.
//!
//! Every error surfaces as a JSON body `{"error": CODE, "message": …}` with
//! the HTTP status from the underlying [`CoreError`]. Unauthenticated
//! browser requests are the one exception: they get a 307 redirect into the
//! OIDC login flow instead of a JSON body.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use autoact_core::CoreError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. "NOT_FOUND".
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// Error type returned by all API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A request-path error from the core taxonomy.
    Core(CoreError),
    /// Missing or unusable credentials on an API request. 401.
    Unauthenticated(String),
    /// No credentials at all; send the caller into the login flow. 307.
    LoginRedirect(String),
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Core(err) => write!(f, "{}", err),
            Self::Unauthenticated(message) => write!(f, "{}", message),
            Self::LoginRedirect(location) => {
                write!(f, "login redirect to '{}'", location)
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Core(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(code = err.error_code(), "request failed: {}", err);
                }
                let body = ErrorBody {
                    error: err.error_code().to_string(),
                    message: err.to_string(),
                };
                (status, Json(body)).into_response()
            }
            Self::Unauthenticated(message) => {
                let body = ErrorBody {
                    error: "UNAUTHENTICATED".to_string(),
                    message,
                };
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(body),
                )
                    .into_response()
            }
            Self::LoginRedirect(location) => (
                StatusCode::TEMPORARY_REDIRECT,
                [(header::LOCATION, location)],
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_maps_to_status() {
        let resp = ApiError::from(CoreError::Unauthorized).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = ApiError::from(CoreError::RateLimited).into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let resp = ApiError::from(CoreError::action_not_found("a-1")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_login_redirect_sets_location() {
        let resp =
            ApiError::LoginRedirect("http://localhost:8080/api/v1/auth/login".to_string())
                .into_response();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "http://localhost:8080/api/v1/auth/login"
        );
    }
}
