// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default model fallback chain for the recommendation API.
pub const DEFAULT_GEMINI_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
];

/// Which remote profile store backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteBackend {
    Firestore,
    /// Process-local store, for offline development.
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    pub remote_backend: RemoteBackend,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// Directory holding the local durable cache
    pub cache_dir: PathBuf,
    /// Recommendation API key; recommendations are disabled without it
    pub gemini_api_key: Option<String>,
    pub gemini_models: Vec<String>,
    /// Upper bound on every remote call
    pub remote_timeout: Duration,
    /// How often the sync worker flushes the outbox
    pub sync_interval: Duration,
    /// Fixed UTC offset (hours) at which daily/monthly resets happen
    pub reset_utc_offset_hours: i32,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            remote_backend: RemoteBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            cache_dir: PathBuf::from(".challenge-cache-test"),
            gemini_api_key: None,
            gemini_models: DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect(),
            remote_timeout: Duration::from_secs(2),
            sync_interval: Duration::from_secs(30),
            reset_utc_offset_hours: 9,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let remote_backend = match env::var("REMOTE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => RemoteBackend::Firestore,
            "memory" => RemoteBackend::Memory,
            _ => return Err(ConfigError::Invalid("REMOTE_BACKEND")),
        };

        let gcp_project_id = match remote_backend {
            RemoteBackend::Firestore => {
                env::var("GCP_PROJECT_ID").map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?
            }
            RemoteBackend::Memory => {
                env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string())
            }
        };

        let gemini_models = env::var("GEMINI_MODELS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODELS.iter().map(|m| m.to_string()).collect());

        let reset_utc_offset_hours: i32 = parse_or("RESET_UTC_OFFSET_HOURS", 9)?;
        if !(-12..=14).contains(&reset_utc_offset_hours) {
            return Err(ConfigError::Invalid("RESET_UTC_OFFSET_HOURS"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            remote_backend,
            gcp_project_id,
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".challenge-cache")),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            gemini_models,
            remote_timeout: Duration::from_secs(parse_or("REMOTE_TIMEOUT_SECS", 10)?),
            sync_interval: Duration::from_secs(parse_or("SYNC_INTERVAL_SECS", 30)?),
            reset_utc_offset_hours,
        })
    }
}

/// Parse an optional numeric environment variable, falling back to `default`.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
