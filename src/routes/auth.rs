// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login and logout routes.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Profile;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
}

/// Login request body.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
    /// 6-digit code
    pub credential: String,
}

/// Replace the session's profile with the one matching the credentials.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Profile>> {
    let profile = state.store.login(&body.nickname, &body.credential).await?;
    Ok(Json(profile))
}

/// Clear the session. The remote profile is kept.
async fn logout(State(state): State<Arc<AppState>>) -> Result<StatusCode> {
    state.store.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}
