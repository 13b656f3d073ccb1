// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session gate middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware that requires a set-up profile in the session.
///
/// Onboarding and login are reachable without it; everything else under
/// `/api` is not.
pub async fn require_setup(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.store.is_setup() {
        tracing::debug!(path = %request.uri().path(), "Rejected request without profile");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
