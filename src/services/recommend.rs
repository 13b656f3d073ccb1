// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gemini client for daily meal and workout suggestions.
//!
//! Handles:
//! - Prompt construction from the profile's targets
//! - Model fallback (each configured model is tried in order)
//! - Rate limit detection (quota message once every model is exhausted)

use serde::Deserialize;

use crate::error::AppError;
use crate::models::{Profile, Recommendation};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    models: Vec<String>,
}

impl GeminiClient {
    /// Create a client. Without an API key every request fails fast.
    pub fn new(api_key: Option<String>, models: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            models,
        }
    }

    /// Point the client at a different API root (e.g. a local fake).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask each model in turn for today's plan and return the first
    /// parseable answer.
    pub async fn recommend(&self, profile: &Profile) -> Result<Recommendation, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Recommendation(AppError::RECOMMENDATION_DISABLED.to_string()))?;

        let prompt = build_prompt(profile)?;
        let mut last_error: Option<AppError> = None;

        for model in &self.models {
            let result = self
                .generate(model, api_key, &prompt)
                .await
                .and_then(|text| extract_recommendation(&text));

            match result {
                Ok(recommendation) => {
                    tracing::info!(model = %model, "Recommendation generated");
                    return Ok(recommendation);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Recommendation model failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Recommendation("no recommendation models configured".to_string())
        }))
    }

    async fn generate(&self, model: &str, api_key: &str, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Recommendation(e.to_string()))?;

        let parsed: GenerateContentResponse = self.check_response_json(response).await?;

        parsed
            .candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| AppError::Recommendation("empty model response".to_string()))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Recommendation rate limit hit (429)");
                return Err(AppError::Recommendation(
                    AppError::RECOMMENDATION_QUOTA.to_string(),
                ));
            }

            return Err(AppError::Recommendation(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Recommendation(format!("JSON parse error: {}", e)))
    }
}

/// Build the request prompt. The profile must have derived targets.
pub fn build_prompt(profile: &Profile) -> Result<String, AppError> {
    let derived = profile.derived.ok_or_else(|| {
        AppError::Validation("body metrics are incomplete; save height, weight and age first".to_string())
    })?;
    let metrics = &profile.metrics;

    Ok(format!(
        "You are a fitness and nutrition coach for members of a diet and running challenge.\n\
         Member: {height} cm, {weight} kg, {age} years, daily target {target} kcal \
         (protein {protein} g, fat {fat} g, carbohydrate {carb} g), track: {track}.\n\
         Recommend today's meals and workouts.\n\
         Workouts must be running, cardio or interval training only; no weight training. \
         Give a pace, distance or interval timing for runs, and use line breaks in descriptions.\n\
         Reply with JSON only, in this shape:\n\
         {{\"diet\": [{{\"type\": \"breakfast\", \"menu\": \"...\", \"kcal\": 0, \"protein\": 0}}], \
         \"workouts\": [{{\"name\": \"...\", \"duration\": \"30 min\", \"intensity\": \"...\", \"description\": \"...\"}}]}}",
        height = metrics.height_cm.unwrap_or_default(),
        weight = metrics.weight_kg.unwrap_or_default(),
        age = metrics.age.unwrap_or_default(),
        target = derived.target_calories,
        protein = derived.macros.protein_g,
        fat = derived.macros.fat_g,
        carb = derived.macros.carb_g,
        track = profile.track.as_str(),
    ))
}

/// Parse the outermost JSON object embedded in model output.
///
/// Models often wrap the object in prose or code fences.
pub fn extract_recommendation(text: &str) -> Result<Recommendation, AppError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(AppError::Recommendation(
                "model response contained no JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str(json)
        .map_err(|e| AppError::Recommendation(format!("malformed recommendation: {}", e)))
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileUpdate;

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

    #[test]
    fn test_extract_from_fenced_text() {
        let text = "Here you go:\n```json\n{\"diet\": [{\"type\": \"lunch\", \"menu\": \"salad\", \"kcal\": 450, \"protein\": 30}], \"workouts\": []}\n```";

        let rec = extract_recommendation(text).unwrap();

        assert_eq!(rec.diet.len(), 1);
        assert_eq!(rec.diet[0].meal_type, "lunch");
        assert_eq!(rec.diet[0].kcal, 450.0);
        assert!(rec.workouts.is_empty());
    }

    #[test]
    fn test_extract_rejects_missing_object() {
        assert!(extract_recommendation("no json here").is_err());
        assert!(extract_recommendation("} backwards {").is_err());
        assert!(extract_recommendation("{not json}").is_err());
    }

    #[test]
    fn test_prompt_includes_targets() {
        let prompt = build_prompt(&ready_profile()).unwrap();
        assert!(prompt.contains("175 cm"));
        assert!(prompt.contains("1808 kcal"));
        assert!(prompt.contains("protein 140 g"));
    }

    #[test]
    fn test_prompt_requires_metrics() {
        assert!(matches!(
            build_prompt(&Profile::default()),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = GeminiClient::new(None, vec!["model".to_string()])
            .with_base_url("http://127.0.0.1:9");

        let err = client.recommend(&ready_profile()).await.unwrap_err();

        assert!(!client.is_configured());
        assert!(matches!(err, AppError::Recommendation(msg) if msg == AppError::RECOMMENDATION_DISABLED));
    }
}
