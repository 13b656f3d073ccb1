// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recommendation client against a local fake of the Gemini API.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::post, Json, Router};
use challenge_tracker::error::AppError;
use challenge_tracker::models::{Profile, ProfileUpdate};
use challenge_tracker::services::GeminiClient;
use serde_json::json;
use std::collections::HashMap;

const API_KEY: &str = "test-key";

fn candidate(text: &str) -> Response {
    Json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
    .into_response()
}

/// Model behavior is chosen by name: `limited-*` answers 429, `chatty-*`
/// answers prose, anything else answers a fenced JSON plan.
async fn generate(Path(call): Path<String>, Query(query): Query<HashMap<String, String>>) -> Response {
    if query.get("key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, "bad key").into_response();
    }
    let model = call.trim_end_matches(":generateContent");

    if model.starts_with("limited") {
        (StatusCode::TOO_MANY_REQUESTS, "quota").into_response()
    } else if model.starts_with("chatty") {
        candidate("Eat well and keep moving!")
    } else {
        candidate(&format!(
            "```json\n{}\n```",
            json!({
                "diet": [{ "type": "breakfast", "menu": model, "kcal": 420, "protein": 25 }],
                "workouts": [{
                    "name": "interval run",
                    "duration": "25 min",
                    "intensity": "high",
                    "description": "6 x 1 min fast\n2 min easy"
                }]
            })
        ))
    }
}

/// Serve the fake on an ephemeral port and return its base URL.
async fn spawn_fake() -> String {
    let app = Router::new().route("/models/{call}", post(generate));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str, models: &[&str]) -> GeminiClient {
    GeminiClient::new(
        Some(API_KEY.to_string()),
        models.iter().map(|m| m.to_string()).collect(),
    )
    .with_base_url(base_url)
}

fn ready_profile() -> Profile {
    let mut profile = Profile::default();
    ProfileUpdate {
        nickname: Some("runner".to_string()),
        height_cm: Some(175.0),
        weight_kg: Some(70.0),
        age: Some(25),
        ..ProfileUpdate::default()
    }
    .apply_to(&mut profile);
    profile
}

#[tokio::test]
async fn test_first_model_answers() {
    let base = spawn_fake().await;

    let rec = client(&base, &["primary", "backup"])
        .recommend(&ready_profile())
        .await
        .unwrap();

    assert_eq!(rec.diet[0].menu, "primary");
    assert_eq!(rec.workouts[0].name, "interval run");
    assert!(rec.workouts[0].description.contains('\n'));
}

#[tokio::test]
async fn test_rate_limited_model_falls_back() {
    let base = spawn_fake().await;

    let rec = client(&base, &["limited-a", "backup"])
        .recommend(&ready_profile())
        .await
        .unwrap();

    assert_eq!(rec.diet[0].menu, "backup");
}

#[tokio::test]
async fn test_unparseable_answer_falls_back() {
    let base = spawn_fake().await;

    let rec = client(&base, &["chatty-a", "backup"])
        .recommend(&ready_profile())
        .await
        .unwrap();

    assert_eq!(rec.diet[0].menu, "backup");
}

#[tokio::test]
async fn test_all_models_limited_reports_quota() {
    let base = spawn_fake().await;

    let err = client(&base, &["limited-a", "limited-b"])
        .recommend(&ready_profile())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Recommendation(msg) if msg == AppError::RECOMMENDATION_QUOTA));
}

#[tokio::test]
async fn test_incomplete_profile_never_calls_out() {
    let err = client("http://127.0.0.1:9", &["primary"])
        .recommend(&Profile::default())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}
