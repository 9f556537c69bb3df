// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures reported by the identity provider.
///
/// These are shown to the user verbatim so the sign-in form stays usable
/// for a retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("No account exists for this email")]
    UnknownUser,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("An account already exists for this email")]
    EmailTaken,

    #[error("Password is too weak")]
    WeakPassword,

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not enough XP: balance {balance}, cost {cost}")]
    InsufficientXp { balance: u64, cost: u64 },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The item write of a ledger operation landed but the balance write did not.
    #[error("Item {item_id} updated but balance write of {expected_xp} XP failed")]
    LedgerDivergence { item_id: String, expected_xp: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::InsufficientXp { .. } => (StatusCode::CONFLICT, "insufficient_xp"),
            AppError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UnknownUser => {
                    (StatusCode::UNAUTHORIZED, "auth_failed")
                }
                AuthError::InvalidEmail | AuthError::WeakPassword => {
                    (StatusCode::BAD_REQUEST, "auth_invalid")
                }
                AuthError::EmailTaken => (StatusCode::CONFLICT, "auth_conflict"),
                AuthError::Provider(_) => (StatusCode::BAD_GATEWAY, "auth_provider_error"),
            },
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::LedgerDivergence { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ledger_divergence")
            }
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();

        let details = match &self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => Some(msg.clone()),
            AppError::InsufficientXp { .. } | AppError::Auth(_) => Some(self.to_string()),
            AppError::LedgerDivergence { .. } => {
                tracing::error!(error = %self, "Ledger divergence reported to client");
                Some("Item was updated but the XP balance was not. Retry to reconcile.".to_string())
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream error");
                Some(msg.clone())
            }
            AppError::Timeout(op) => Some(format!("{} did not complete in time", op)),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::Unauthorized | AppError::InvalidToken => None,
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
