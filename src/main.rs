// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge-Tracker companion server
//!
//! Runs one profile session for this device: loads it from the local
//! cache, keeps it in sync with the remote profile store, and serves the
//! JSON API the UI talks to.

use anyhow::Context;
use challenge_tracker::{
    cache::{FileCache, LocalCache},
    config::{Config, RemoteBackend},
    db::{FirestoreDb, MemoryDb, ProfileRepository},
    services::{GeminiClient, ProfileStore, StoreSettings, SystemClock},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Challenge-Tracker API");

    // Remote profile store
    let remote: Arc<dyn ProfileRepository> = match config.remote_backend {
        RemoteBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .context("Failed to connect to Firestore")?,
        ),
        RemoteBackend::Memory => {
            tracing::warn!("Using in-memory remote store; data is lost on exit");
            Arc::new(MemoryDb::new())
        }
    };

    // Local durable cache
    let cache: Arc<dyn LocalCache> =
        Arc::new(FileCache::open(&config.cache_dir).context("Failed to open local cache")?);
    tracing::info!(dir = %config.cache_dir.display(), "Local cache opened");

    let store = Arc::new(
        ProfileStore::bootstrap(
            cache,
            remote,
            Arc::new(SystemClock),
            StoreSettings::from_config(&config),
        )
        .context("Failed to load profile")?,
    );
    let _sync_worker = store.spawn_sync_worker();
    tracing::info!(
        interval_secs = config.sync_interval.as_secs(),
        "Sync worker started"
    );

    let recommender = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_models.clone());
    if !recommender.is_configured() {
        tracing::warn!("GEMINI_API_KEY not set, recommendations disabled");
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        recommender,
    });

    // Build router
    let app = challenge_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("challenge_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
