// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing input. Never retried.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Duplicate nickname or credential mismatch. Never mutates local state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network or service failure talking to the remote profile store.
    #[error("Remote service unavailable: {0}")]
    RemoteUnavailable(String),

    /// A certification slot is already full.
    #[error("Capacity reached: {0}")]
    Capacity(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The session has no set-up profile.
    #[error("Profile setup required")]
    Unauthorized,

    #[error("Explicit confirmation required")]
    ConfirmationRequired,

    #[error("Recommendation service error: {0}")]
    Recommendation(String),

    #[error("Local cache error: {0}")]
    Cache(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message shown to the user when a login attempt does not match.
    pub const LOGIN_MISMATCH: &'static str = "nickname or credential mismatch";

    /// Message shown to the user when the server could not be reached.
    pub const SERVER_ERROR: &'static str = "server error";

    /// Message shown when every recommendation model is rate limited.
    pub const RECOMMENDATION_QUOTA: &'static str =
        "recommendation quota exhausted, please try again tomorrow";

    /// Message shown when no recommendation API key is configured.
    pub const RECOMMENDATION_DISABLED: &'static str = "recommendation API key is not configured";

    /// Whether a failed remote write is worth retrying later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::RemoteUnavailable(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::RemoteUnavailable(msg) => {
                tracing::warn!(error = %msg, "Remote service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "remote_unavailable",
                    Some(Self::SERVER_ERROR.to_string()),
                )
            }
            AppError::Capacity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "capacity",
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "setup_required", None),
            AppError::ConfirmationRequired => (
                StatusCode::PRECONDITION_REQUIRED,
                "confirmation_required",
                None,
            ),
            AppError::Recommendation(msg) => {
                (StatusCode::BAD_GATEWAY, "recommendation_error", Some(msg.clone()))
            }
            AppError::Cache(msg) => {
                tracing::error!(error = %msg, "Local cache error");
                (StatusCode::INTERNAL_SERVER_ERROR, "cache_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
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
