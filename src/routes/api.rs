// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes over the session's profile store.

use crate::error::Result;
use crate::models::{
    CertKind, Certification, CommunityPost, InbodyRecord, LeaderboardEntry, Profile,
    ProfileUpdate, Recommendation,
};
use crate::services::{RemoteOp, SyncReport};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile routes reachable before onboarding is complete.
pub fn onboarding_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/profile", get(get_profile).put(save_profile))
}

/// API routes (require a set-up profile).
/// The session gate is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/points", post(adjust_points))
        .route("/api/certifications", post(submit_certification))
        .route("/api/certifications/{kind}", delete(withdraw_certification))
        .route("/api/status", put(update_status))
        .route("/api/inbody", post(add_inbody_record))
        .route("/api/plan", get(generate_plan).put(save_plan))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/community", get(get_community))
        .route("/api/sync", get(get_sync_status).post(sync_now))
}

// ─── Profile ─────────────────────────────────────────────────

/// Current profile plus its sync state.
#[derive(Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: Profile,
    /// Remote writes not yet acknowledged
    pub pending_sync: usize,
}

async fn get_profile(State(state): State<Arc<AppState>>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        profile: state.store.profile(),
        pending_sync: state.store.pending_ops().len(),
    })
}

/// Onboarding and settings save. Responds once the remote write has
/// landed or been queued.
async fn save_profile(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let profile = state.store.save_profile(update).await?;
    Ok(Json(ProfileResponse {
        profile,
        pending_sync: state.store.pending_ops().len(),
    }))
}

/// Status message edit.
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Profile>> {
    Ok(Json(state.store.update_status(&body.status)?))
}

async fn add_inbody_record(
    State(state): State<Arc<AppState>>,
    Json(record): Json<InbodyRecord>,
) -> Result<(StatusCode, Json<Vec<InbodyRecord>>)> {
    let records = state.store.add_inbody_record(record)?;
    Ok((StatusCode::CREATED, Json(records)))
}

// ─── Points & Certifications ─────────────────────────────────

#[derive(Deserialize)]
pub struct PointsRequest {
    pub delta: i64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PointsResponse {
    pub points: u32,
}

async fn adjust_points(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PointsRequest>,
) -> Result<Json<PointsResponse>> {
    let points = state.store.adjust_points(body.delta)?;
    Ok(Json(PointsResponse { points }))
}

#[derive(Deserialize)]
pub struct CertificationRequest {
    pub kind: CertKind,
    /// Data URL or bare base64 image
    pub image: String,
}

/// Certification change and the resulting points.
#[derive(Serialize)]
pub struct CertificationResponse {
    pub certification: Certification,
    pub points: u32,
}

async fn submit_certification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CertificationRequest>,
) -> Result<(StatusCode, Json<CertificationResponse>)> {
    let certification = state.store.submit_certification(body.kind, body.image)?;
    let points = state.store.profile().points;
    Ok((
        StatusCode::CREATED,
        Json(CertificationResponse {
            certification,
            points,
        }),
    ))
}

/// Query parameters for a withdrawal.
#[derive(Deserialize)]
pub struct WithdrawParams {
    /// Position in the diet list
    pub index: Option<usize>,
    /// Must be true; the UI sets it after asking the user
    #[serde(default)]
    pub confirm: bool,
}

async fn withdraw_certification(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<WithdrawParams>,
) -> Result<Json<CertificationResponse>> {
    let kind: CertKind = kind.parse()?;
    let certification = state
        .store
        .withdraw_certification(kind, params.index, params.confirm)?;
    let points = state.store.profile().points;
    Ok(Json(CertificationResponse {
        certification,
        points,
    }))
}

// ─── Today's Plan ────────────────────────────────────────────

/// Generate a fresh recommendation. Not saved until PUT.
async fn generate_plan(State(state): State<Arc<AppState>>) -> Result<Json<Recommendation>> {
    let profile = state.store.profile();
    Ok(Json(state.recommender.recommend(&profile).await?))
}

async fn save_plan(
    State(state): State<Arc<AppState>>,
    Json(plan): Json<Recommendation>,
) -> Result<StatusCode> {
    state.store.save_today_plan(plan)?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Leaderboard & Community ─────────────────────────────────

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    Ok(Json(state.store.leaderboard().await?))
}

async fn get_community(State(state): State<Arc<AppState>>) -> Result<Json<Vec<CommunityPost>>> {
    Ok(Json(state.store.community_feed().await?))
}

// ─── Sync ────────────────────────────────────────────────────

/// Outbox state for the "not synced" indicator.
#[derive(Serialize)]
pub struct SyncStatus {
    pub pending: usize,
    pub ops: Vec<RemoteOp>,
}

async fn get_sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    let ops = state.store.pending_ops();
    Json(SyncStatus {
        pending: ops.len(),
        ops,
    })
}

/// Retry queued writes immediately.
async fn sync_now(State(state): State<Arc<AppState>>) -> Json<SyncReport> {
    Json(state.store.sync_now().await)
}
