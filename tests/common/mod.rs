// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{DateTime, TimeZone, Utc};
use challenge_tracker::cache::{LocalCache, MemoryCache};
use challenge_tracker::config::Config;
use challenge_tracker::db::{FirestoreDb, MemoryDb, ProfileRepository};
use challenge_tracker::models::{Profile, ProfileRow, ProfileUpdate, Sex};
use challenge_tracker::routes::create_router;
use challenge_tracker::services::{
    Clock, FixedClock, GeminiClient, ProfileStore, RetryPolicy, StoreSettings,
};
use challenge_tracker::time_utils::reset_offset;
use challenge_tracker::AppState;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;

/// Smallest valid certification image.
#[allow(dead_code)]
pub const IMAGE: &str = "data:image/png;base64,aGVsbG8=";

#[allow(dead_code)]
pub const CREDENTIAL: &str = "123456";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// 2026-03-10 12:00 at the UTC+9 reset offset.
#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 3, 0, 0).unwrap()
}

/// Fast timeouts and no backoff, so retries are driven by the test.
#[allow(dead_code)]
pub fn test_settings() -> StoreSettings {
    StoreSettings {
        remote_timeout: Duration::from_millis(200),
        reset_offset: reset_offset(9),
        retry: RetryPolicy {
            base: Duration::ZERO,
            max: Duration::ZERO,
        },
        sync_interval: Duration::from_secs(30),
    }
}

/// A session wired to in-memory collaborators.
#[allow(dead_code)]
pub struct Harness {
    pub remote: Arc<MemoryDb>,
    pub cache: Arc<MemoryCache>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<ProfileStore>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        let remote = Arc::new(MemoryDb::new());
        let cache = Arc::new(MemoryCache::new());
        let clock = Arc::new(FixedClock::new(start_time()));
        let store = Self::open(&remote, &cache, &clock);
        Self {
            remote,
            cache,
            clock,
            store,
        }
    }

    fn open(
        remote: &Arc<MemoryDb>,
        cache: &Arc<MemoryCache>,
        clock: &Arc<FixedClock>,
    ) -> Arc<ProfileStore> {
        let remote: Arc<dyn ProfileRepository> = remote.clone();
        let cache: Arc<dyn LocalCache> = cache.clone();
        let clock: Arc<dyn Clock> = clock.clone();
        Arc::new(
            ProfileStore::bootstrap(cache, remote, clock, test_settings())
                .expect("bootstrap should succeed"),
        )
    }

    /// Simulate a restart: a new store over the same cache and remote.
    pub fn reopen(&self) -> Arc<ProfileStore> {
        Self::open(&self.remote, &self.cache, &self.clock)
    }

    /// Another device: same remote store and clock, its own cache.
    pub fn device(&self) -> Self {
        let remote = self.remote.clone();
        let cache = Arc::new(MemoryCache::new());
        let clock = self.clock.clone();
        let store = Self::open(&remote, &cache, &clock);
        Self {
            remote,
            cache,
            clock,
            store,
        }
    }

    /// Names of the queued remote ops, in flush order.
    pub fn pending(&self) -> Vec<&'static str> {
        self.store.pending_ops().iter().map(|op| op.name()).collect()
    }

    /// Onboard a profile and return its remote id.
    pub async fn onboard(&self, nickname: &str) -> String {
        self.store
            .save_profile(onboarding(nickname))
            .await
            .expect("onboarding should succeed");
        self.store
            .profile()
            .remote_id
            .expect("profile should be stored remotely")
    }
}

/// Complete onboarding payload: 175 cm, 70 kg, male, 25, sedentary, 10%.
#[allow(dead_code)]
pub fn onboarding(nickname: &str) -> ProfileUpdate {
    ProfileUpdate {
        nickname: Some(nickname.to_string()),
        credential: Some(CREDENTIAL.to_string()),
        height_cm: Some(175.0),
        weight_kg: Some(70.0),
        sex: Some(Sex::Male),
        age: Some(25),
        ..ProfileUpdate::default()
    }
}

/// A remote row for a profile that never touched this device.
#[allow(dead_code)]
pub fn remote_row(nickname: &str, points: u32) -> ProfileRow {
    let mut profile = Profile::default();
    onboarding(nickname).apply_to(&mut profile);
    profile.points = points;
    profile.to_row("", "2026-03-01T00:00:00Z")
}

/// Create a test app with in-memory dependencies.
/// Returns the router, the shared state and the session harness.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Harness) {
    let config = Config::test_default();
    let harness = Harness::new();
    let recommender = GeminiClient::new(None, config.gemini_models.clone());

    let state = Arc::new(AppState {
        config,
        store: harness.store.clone(),
        recommender,
    });

    (create_router(state.clone()), state, harness)
}

/// Build a JSON request.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a request without a body.
#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
