// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The session's profile store.
//!
//! Owns the in-memory working copy of the user's profile and keeps it in
//! step with the local cache (written synchronously on every commit) and
//! the remote profile store (written through the outbox; profile saves
//! wait for their own entry to run).
//!
//! A commit whose cache write fails is rolled back, so memory, cache and
//! outbox never disagree about a change.
//!
//! Handles:
//! - Bootstrap from the local cache and scheduled monthly/daily resets
//! - Remote reconciliation, login and logout
//! - Profile saves with derived-metric recomputation
//! - Points and certification bookkeeping
//! - Background flushing of queued remote writes

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use validator::Validate;

use crate::cache::{keys, LocalCache};
use crate::config::Config;
use crate::db::{new_id, ProfileRepository};
use crate::error::AppError;
use crate::models::certification::{validate_image_payload, POINTS_PER_CERT};
use crate::models::leaderboard::rank_profiles;
use crate::models::profile::{normalize_status, MAX_STATUS_CHARS};
use crate::models::{
    CertKind, Certification, CommunityPost, InbodyRecord, LeaderboardEntry, Profile,
    ProfileUpdate, Recommendation,
};
use crate::services::clock::Clock;
use crate::services::credential;
use crate::services::outbox::{Head, Outbox, RemoteOp, RetryPolicy};
use crate::time_utils::{day_bucket, format_utc_rfc3339, month_bucket, reset_offset};

/// Rows fetched for the leaderboard.
pub const LEADERBOARD_LIMIT: u32 = 100;

/// Posts fetched for the community feed.
pub const FEED_LIMIT: u32 = 50;

/// Tunables for a [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Upper bound on every remote call
    pub remote_timeout: Duration,
    /// Offset in which reset buckets are computed
    pub reset_offset: FixedOffset,
    pub retry: RetryPolicy,
    /// Idle period between background flushes
    pub sync_interval: Duration,
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_timeout: config.remote_timeout,
            reset_offset: reset_offset(config.reset_utc_offset_hours),
            retry: RetryPolicy::default(),
            sync_interval: config.sync_interval,
        }
    }
}

/// Which scheduled resets fired.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    pub monthly: bool,
    pub daily: bool,
}

/// Result of one outbox flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub completed: usize,
    /// Ops given up on after a non-retryable failure
    pub dropped: usize,
    /// Ops still queued (e.g. behind a failed head)
    pub remaining: usize,
}

/// Outcome of running the head of the outbox once.
enum Step {
    Idle,
    Completed,
    /// Failed transiently; the head stays queued with backoff.
    Deferred,
    /// Failed for good; the op was removed.
    Dropped(AppError),
}

pub struct ProfileStore {
    state: watch::Sender<Profile>,
    cache: Arc<dyn LocalCache>,
    remote: Arc<dyn ProfileRepository>,
    clock: Arc<dyn Clock>,
    outbox: Mutex<Outbox>,
    /// Held for the whole of a flush.
    flush_lock: tokio::sync::Mutex<()>,
    /// Held by operations that replace or roll back the working set.
    session_lock: tokio::sync::Mutex<()>,
    wake: Notify,
    settings: StoreSettings,
}

/// Copy the user-editable settings (not points or certifications).
fn copy_settings(from: &Profile, to: &mut Profile) {
    to.nickname = from.nickname.clone();
    to.metrics = from.metrics.clone();
    to.derived = from.derived;
    to.track = from.track;
    to.status = from.status.clone();
    to.is_setup = from.is_setup;
}

impl ProfileStore {
    /// Build the store from the local cache, without touching the network.
    ///
    /// Applies any due monthly/daily reset before returning.
    pub fn bootstrap(
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn ProfileRepository>,
        clock: Arc<dyn Clock>,
        settings: StoreSettings,
    ) -> Result<Self, AppError> {
        let mut profile = match cache.get(keys::PROFILE)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Cached profile unreadable, starting blank");
                Profile::default()
            }),
            None => Profile::default(),
        };
        if profile.remote_id.is_none() {
            profile.remote_id = cache.get(keys::REMOTE_ID)?;
        }
        profile.recompute();

        tracing::info!(
            profile_id = ?profile.remote_id,
            is_setup = profile.is_setup,
            "Profile store bootstrapped"
        );

        let (state, _) = watch::channel(profile);
        let store = Self {
            state,
            cache,
            remote,
            clock,
            outbox: Mutex::new(Outbox::new(settings.retry)),
            flush_lock: tokio::sync::Mutex::new(()),
            session_lock: tokio::sync::Mutex::new(()),
            wake: Notify::new(),
            settings,
        };
        store.check_resets()?;
        Ok(store)
    }

    // ─── Observation ─────────────────────────────────────────────

    /// Snapshot of the current profile.
    pub fn profile(&self) -> Profile {
        self.state.borrow().clone()
    }

    /// Receiver notified on every committed change.
    pub fn subscribe(&self) -> watch::Receiver<Profile> {
        self.state.subscribe()
    }

    pub fn is_setup(&self) -> bool {
        self.state.borrow().is_setup
    }

    /// Remote writes not yet acknowledged, in flush order.
    pub fn pending_ops(&self) -> Vec<RemoteOp> {
        self.outbox().ops()
    }

    // ─── Scheduled resets ────────────────────────────────────────

    /// Zero points on a new month and clear today's slots on a new day.
    ///
    /// Running it again within the same day and month changes nothing.
    pub fn check_resets(&self) -> Result<ResetOutcome, AppError> {
        let now = self.clock.now();
        let month = month_bucket(now, self.settings.reset_offset);
        let day = day_bucket(now, self.settings.reset_offset);

        let outcome = ResetOutcome {
            monthly: self.marker_stale(keys::LAST_RESET_MONTH, &month)?,
            daily: self.marker_stale(keys::LAST_RESET_DAY, &day)?,
        };
        if !outcome.monthly && !outcome.daily {
            return Ok(outcome);
        }

        self.commit(|p| {
            let mut changed = false;
            if outcome.monthly && p.points != 0 {
                p.points = 0;
                changed = true;
            }
            if outcome.daily && (!p.certs.is_empty() || p.today_plan.is_some()) {
                p.certs.clear();
                p.today_plan = None;
                changed = true;
            }
            changed
        })?;

        if outcome.monthly {
            self.cache.set(keys::LAST_RESET_MONTH, &month)?;
            self.enqueue(RemoteOp::SetPoints);
        }
        if outcome.daily {
            self.cache.set(keys::LAST_RESET_DAY, &day)?;
        }

        tracing::info!(
            month = %month,
            day = %day,
            monthly = outcome.monthly,
            daily = outcome.daily,
            "Scheduled reset applied"
        );
        Ok(outcome)
    }

    /// A missing marker is initialized to `current` and is not stale.
    fn marker_stale(&self, key: &str, current: &str) -> Result<bool, AppError> {
        match self.cache.get(key)? {
            Some(last) => Ok(last != current),
            None => {
                self.cache.set(key, current)?;
                Ok(false)
            }
        }
    }

    // ─── Remote session ──────────────────────────────────────────

    /// Merge the remote row into local state, if a remote id is known.
    ///
    /// Remote body metrics and points win, except for columns with an
    /// unflushed local write. Failures are logged and leave local state
    /// authoritative. Returns whether the remote row was found.
    pub async fn reconcile(&self) -> bool {
        let Some(id) = self.state.borrow().remote_id.clone() else {
            return false;
        };

        let row = match self.with_timeout(self.remote.get_profile(&id)).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::warn!(profile_id = %id, "Remote profile not found, keeping local state");
                return false;
            }
            Err(e) => {
                tracing::warn!(profile_id = %id, error = %e, "Reconcile failed, keeping local state");
                return false;
            }
        };

        let (keep_local_settings, keep_local_points) = {
            let outbox = self.outbox();
            (outbox.has_pending_save(), outbox.has_pending_points())
        };

        let changed = self
            .commit(|p| {
                if p.remote_id.as_deref() != Some(row.id.as_str()) {
                    return false;
                }
                let before = p.clone();
                if !keep_local_settings {
                    p.apply_row_metrics(&row);
                }
                if !keep_local_points {
                    p.apply_row_points(&row);
                }
                p.recompute();
                p.is_setup = true;
                *p != before
            })
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to cache reconciled profile");
                false
            });
        tracing::debug!(profile_id = %id, changed, "Reconciled with remote profile");
        true
    }

    /// Replace the working set with the profile matching `nickname` and
    /// `credential`.
    ///
    /// A mismatch is a [`AppError::Conflict`] and leaves state untouched.
    pub async fn login(&self, nickname: &str, credential: &str) -> Result<Profile, AppError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(AppError::Validation("nickname is required".to_string()));
        }
        credential::validate_format(credential)?;

        let _session = self.session_lock.lock().await;

        let row = self
            .with_timeout(self.remote.find_by_nickname(nickname))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Login lookup failed"))?
            .ok_or_else(|| AppError::Conflict(AppError::LOGIN_MISMATCH.to_string()))?;

        let candidate = credential.to_string();
        let stored = row.credential_hash.clone();
        let matches = tokio::task::spawn_blocking(move || {
            credential::verify_credential(&candidate, &stored)
        })
        .await
        .map_err(|e| anyhow::anyhow!("credential check failed: {}", e))?;

        if !matches {
            tracing::info!(nickname, "Login rejected");
            return Err(AppError::Conflict(AppError::LOGIN_MISMATCH.to_string()));
        }

        // Give the previous session's queued writes one chance to land.
        let _flush = self.flush_lock.lock().await;
        self.drain(true).await;
        let dropped = self.outbox().clear();
        if dropped > 0 {
            tracing::warn!(dropped, "Discarding unsynced changes of previous session");
        }

        let profile = Profile::from_row(&row);
        self.commit(|p| {
            *p = profile.clone();
            true
        })?;

        tracing::info!(profile_id = %row.id, "Logged in");
        Ok(profile)
    }

    /// Clear the working set and the cached profile. The remote row stays.
    pub async fn logout(&self) -> Result<(), AppError> {
        let _session = self.session_lock.lock().await;

        let _flush = self.flush_lock.lock().await;
        self.drain(true).await;
        let dropped = self.outbox().clear();
        if dropped > 0 {
            tracing::warn!(dropped, "Discarding unsynced changes on logout");
        }

        self.cache.remove(keys::PROFILE)?;
        self.cache.remove(keys::REMOTE_ID)?;
        let previous = self.state.send_replace(Profile::default());

        tracing::info!(profile_id = ?previous.remote_id, "Logged out");
        Ok(())
    }

    // ─── Profile edits ───────────────────────────────────────────

    /// Merge `update`, recompute derived metrics, commit locally and upsert
    /// remotely.
    ///
    /// The write is queued and run at once, behind any earlier queued
    /// writes, so changes made while it is in flight queue after it. If the
    /// store is unreachable the local commit stands and the write stays
    /// queued; a nickname conflict restores the previous settings and is
    /// returned.
    pub async fn save_profile(&self, update: ProfileUpdate) -> Result<Profile, AppError> {
        update.validate()?;
        if let Some(code) = &update.credential {
            credential::validate_format(code)?;
        }

        let _session = self.session_lock.lock().await;

        let previous = self.profile();
        let mut next = previous.clone();
        update.apply_to(&mut next);
        next.is_setup = true;

        if next.nickname.is_empty() {
            return Err(AppError::Validation("nickname is required".to_string()));
        }
        if next.derived.is_none() {
            return Err(AppError::Validation(
                "height, weight and age are required".to_string(),
            ));
        }
        let insert_pending = self.outbox().has_pending_save();
        if next.remote_id.is_none() && update.credential.is_none() && !insert_pending {
            return Err(AppError::Validation(format!(
                "a {}-digit credential is required to create a profile",
                credential::CREDENTIAL_LEN
            )));
        }

        let credential_hash = match update.credential {
            Some(code) => Some(
                tokio::task::spawn_blocking(move || credential::hash_credential(&code))
                    .await
                    .map_err(|e| anyhow::anyhow!("credential hashing failed: {}", e))??,
            ),
            None => None,
        };

        let _flush = self.flush_lock.lock().await;
        self.commit(|p| {
            copy_settings(&next, p);
            true
        })?;

        let behind_queued = {
            let mut outbox = self.outbox();
            let queued = !outbox.is_empty();
            outbox.push(RemoteOp::SaveProfile { credential_hash });
            queued
        };
        if behind_queued {
            let report = self.drain(true).await;
            tracing::debug!(?report, "Profile save flushed behind queued writes");
            return Ok(self.profile());
        }

        match self.step(true).await {
            Step::Idle | Step::Completed => {}
            Step::Deferred => tracing::warn!("Profile save deferred"),
            Step::Dropped(e) => {
                tracing::warn!(error = %e, "Profile save rejected, restoring previous settings");
                if let Err(cache_err) = self.commit(|p| {
                    copy_settings(&previous, p);
                    true
                }) {
                    tracing::warn!(error = %cache_err, "Failed to cache restored settings");
                }
                if self.state.borrow().remote_id.is_none() {
                    // Nothing queued behind a failed insert can reach a row.
                    let dropped = self.outbox().clear();
                    tracing::debug!(dropped, "Discarded writes queued behind rejected insert");
                }
                return Err(e);
            }
        }

        // Writes queued while the save was in flight.
        if !self.outbox().is_empty() {
            self.wake.notify_one();
        }
        Ok(self.profile())
    }

    /// Set the leaderboard status message. Empty text restores the default.
    pub fn update_status(&self, status: &str) -> Result<Profile, AppError> {
        let status = normalize_status(status);
        if status.chars().count() > MAX_STATUS_CHARS {
            return Err(AppError::Validation(format!(
                "status must be at most {MAX_STATUS_CHARS} characters"
            )));
        }

        let changed = self.commit(|p| {
            if p.status == status {
                return false;
            }
            p.status = status.to_string();
            true
        })?;
        if changed {
            self.enqueue(RemoteOp::SaveProfile {
                credential_hash: None,
            });
        }
        Ok(self.profile())
    }

    /// Record a body-composition measurement, kept in date order.
    pub fn add_inbody_record(&self, record: InbodyRecord) -> Result<Vec<InbodyRecord>, AppError> {
        record.validate()?;
        chrono::NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
            .map_err(|_| AppError::Validation("date must be YYYY-MM-DD".to_string()))?;

        self.commit(|p| {
            p.inbody_records.push(record);
            p.inbody_records.sort_by(|a, b| a.date.cmp(&b.date));
            true
        })?;
        Ok(self.state.borrow().inbody_records.clone())
    }

    /// Keep a generated recommendation as today's plan until the daily reset.
    pub fn save_today_plan(&self, plan: Recommendation) -> Result<(), AppError> {
        self.commit(|p| {
            p.today_plan = Some(plan);
            true
        })?;
        Ok(())
    }

    // ─── Points and certifications ───────────────────────────────

    /// Apply a signed delta, clamped at zero, and return the new total.
    ///
    /// The remote points column is updated in the background.
    pub fn adjust_points(&self, delta: i64) -> Result<u32, AppError> {
        let mut total = 0;
        let changed = self.commit(|p| {
            let before = p.points;
            total = p.apply_points_delta(delta);
            total != before
        })?;
        if changed {
            self.enqueue(RemoteOp::SetPoints);
        }
        Ok(total)
    }

    /// Fill a certification slot and award its points.
    pub fn submit_certification(
        &self,
        kind: CertKind,
        image: String,
    ) -> Result<Certification, AppError> {
        validate_image_payload(&image)?;

        let cert = Certification {
            id: new_id(),
            image,
            submitted_at: format_utc_rfc3339(self.clock.now()),
        };

        let mut outcome = Ok(());
        self.commit(|p| {
            outcome = if p.track.allows(kind) {
                p.certs.check_capacity(kind)
            } else {
                Err(AppError::Validation(format!(
                    "{} certifications are not part of the {} track",
                    kind.as_str(),
                    p.track.as_str()
                )))
            };
            if outcome.is_err() {
                return false;
            }
            p.certs.insert(kind, cert.clone());
            p.apply_points_delta(POINTS_PER_CERT);
            true
        })?;
        outcome?;

        self.enqueue(RemoteOp::SetPoints);
        self.enqueue(RemoteOp::CreatePost {
            post_id: cert.id.clone(),
            kind,
            image: cert.image.clone(),
            created_at: cert.submitted_at.clone(),
        });

        tracing::info!(kind = kind.as_str(), cert_id = %cert.id, "Certification submitted");
        Ok(cert)
    }

    /// Remove a certification and take its points back.
    ///
    /// Diet entries are addressed by index; the workout slot needs none.
    /// Nothing happens without `confirmed`.
    pub fn withdraw_certification(
        &self,
        kind: CertKind,
        index: Option<usize>,
        confirmed: bool,
    ) -> Result<Certification, AppError> {
        if !confirmed {
            return Err(AppError::ConfirmationRequired);
        }
        if kind == CertKind::Diet && index.is_none() {
            return Err(AppError::Validation(
                "index is required for diet certifications".to_string(),
            ));
        }

        let mut removed = None;
        self.commit(|p| {
            removed = p.certs.remove(kind, index);
            if removed.is_some() {
                p.apply_points_delta(-POINTS_PER_CERT);
            }
            removed.is_some()
        })?;
        let removed = removed.ok_or_else(|| {
            AppError::NotFound(format!("no {} certification to withdraw", kind.as_str()))
        })?;

        self.enqueue(RemoteOp::SetPoints);
        let cancelled = !removed.id.is_empty() && self.outbox().cancel_create_post(&removed.id);
        if !cancelled {
            self.enqueue(RemoteOp::DeletePost {
                post_id: (!removed.id.is_empty()).then(|| removed.id.clone()),
                image: removed.image.clone(),
            });
        }

        tracing::info!(
            kind = kind.as_str(),
            cert_id = %removed.id,
            cancelled,
            "Certification withdrawn"
        );
        Ok(removed)
    }

    // ─── Remote views ────────────────────────────────────────────

    /// Ranked standings, with the session's own line marked.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AppError> {
        let rows = self
            .with_timeout(self.remote.list_by_points(LEADERBOARD_LIMIT))
            .await?;
        let me = self.state.borrow().remote_id.clone();
        Ok(rank_profiles(&rows, me.as_deref()))
    }

    /// Recent community posts, newest first.
    pub async fn community_feed(&self) -> Result<Vec<CommunityPost>, AppError> {
        self.with_timeout(self.remote.list_posts(FEED_LIMIT)).await
    }

    // ─── Outbox ──────────────────────────────────────────────────

    /// Flush queued writes whose backoff has elapsed.
    pub async fn sync_pending(&self) -> SyncReport {
        let _flush = self.flush_lock.lock().await;
        self.drain(false).await
    }

    /// Flush queued writes now, ignoring backoff.
    pub async fn sync_now(&self) -> SyncReport {
        let _flush = self.flush_lock.lock().await;
        self.drain(true).await
    }

    /// Run queued ops in order until the queue is empty or one fails
    /// transiently. Callers hold `flush_lock`.
    async fn drain(&self, force: bool) -> SyncReport {
        let mut report = SyncReport::default();

        loop {
            match self.step(force).await {
                Step::Idle | Step::Deferred => break,
                Step::Completed => report.completed += 1,
                Step::Dropped(_) => report.dropped += 1,
            }
        }

        report.remaining = self.outbox().len();
        report
    }

    /// Run the head op once and settle it. Callers hold `flush_lock`.
    async fn step(&self, force: bool) -> Step {
        let (seq, op) = match self.outbox().begin(Instant::now(), force) {
            Head::Ready { seq, op } => (seq, op),
            Head::Empty | Head::Waiting(_) => return Step::Idle,
        };
        let name = op.name();

        match self.execute(op).await {
            Ok(()) => {
                self.outbox().remove(seq);
                Step::Completed
            }
            Err(e) if e.is_transient() => {
                let delay = self.outbox().retry_later(seq, Instant::now());
                tracing::warn!(op = name, error = %e, retry_in = ?delay, "Remote sync failed, will retry");
                Step::Deferred
            }
            Err(e) => {
                tracing::error!(op = name, error = %e, "Dropping remote operation");
                self.outbox().remove(seq);
                Step::Dropped(e)
            }
        }
    }

    async fn execute(&self, op: RemoteOp) -> Result<(), AppError> {
        match op {
            RemoteOp::SaveProfile { credential_hash } => self.push_profile(credential_hash).await,
            RemoteOp::SetPoints => {
                let (id, snapshot) = self.remote_target()?;
                self.with_timeout(self.remote.update_points(&id, snapshot.points))
                    .await
            }
            RemoteOp::CreatePost {
                post_id,
                kind,
                image,
                created_at,
            } => {
                let (id, snapshot) = self.remote_target()?;
                let post = CommunityPost {
                    id: post_id,
                    profile_id: id,
                    nickname: snapshot.nickname,
                    kind,
                    image,
                    created_at,
                };
                self.with_timeout(self.remote.create_post(&post)).await
            }
            RemoteOp::DeletePost { post_id, image } => {
                let (id, _) = self.remote_target()?;
                match post_id {
                    Some(post_id) => self.with_timeout(self.remote.delete_post(&post_id)).await,
                    None => {
                        let count = self
                            .with_timeout(self.remote.delete_posts_by_image(&id, &image))
                            .await?;
                        tracing::debug!(profile_id = %id, count, "Deleted untracked posts by image");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Upsert the current profile: update by id, or insert and adopt the
    /// new id.
    async fn push_profile(&self, credential_hash: Option<String>) -> Result<(), AppError> {
        let snapshot = self.profile();
        let now = format_utc_rfc3339(self.clock.now());

        match snapshot.remote_id.clone() {
            Some(id) => {
                self.with_timeout(self.remote.update_profile(&snapshot.to_row(&id, &now)))
                    .await?;
                if let Some(hash) = credential_hash {
                    self.with_timeout(self.remote.update_credential(&id, &hash))
                        .await?;
                }
                tracing::debug!(profile_id = %id, "Profile updated remotely");
            }
            None => {
                let hash = credential_hash.ok_or_else(|| {
                    AppError::Validation(
                        "cannot create a remote profile without a credential".to_string(),
                    )
                })?;
                let mut row = snapshot.to_row("", &now);
                row.credential_hash = hash;

                let id = self.with_timeout(self.remote.insert_profile(row)).await?;
                // The row exists now; a failed cache write must not undo that.
                self.state.send_modify(|p| p.remote_id = Some(id.clone()));
                if let Err(e) = self.persist() {
                    tracing::warn!(profile_id = %id, error = %e, "Failed to cache new remote id");
                }
                tracing::info!(profile_id = %id, "Profile created remotely");
            }
        }
        Ok(())
    }

    /// The remote id and a snapshot, for ops that write to an existing row.
    fn remote_target(&self) -> Result<(String, Profile), AppError> {
        let snapshot = self.profile();
        let id = snapshot.remote_id.clone().ok_or_else(|| {
            AppError::Validation("profile is not stored remotely".to_string())
        })?;
        Ok((id, snapshot))
    }

    /// Queue a remote write and wake the sync worker.
    ///
    /// Ops that need a remote row are skipped while the profile has neither
    /// a remote id nor a queued insert.
    fn enqueue(&self, op: RemoteOp) {
        let has_id = self.state.borrow().remote_id.is_some();
        let name = op.name();
        {
            let mut outbox = self.outbox();
            if op.needs_remote_id() && !has_id && !outbox.has_pending_save() {
                tracing::debug!(op = name, "Profile not stored remotely, skipping sync");
                return;
            }
            if !outbox.push(op) {
                tracing::trace!(op = name, "Coalesced with queued write");
            }
        }
        self.wake.notify_one();
    }

    /// Spawn the background task that reconciles once, then flushes the
    /// outbox and re-checks resets whenever woken or idle for
    /// `sync_interval`.
    pub fn spawn_sync_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.reconcile().await;

            loop {
                let wake_at = store.next_wake();
                tokio::select! {
                    _ = tokio::time::sleep_until(wake_at) => {}
                    _ = store.wake.notified() => {}
                }

                if let Err(e) = store.check_resets() {
                    tracing::warn!(error = %e, "Scheduled reset check failed");
                }
                let report = store.sync_pending().await;
                if report.completed > 0 || report.dropped > 0 {
                    tracing::debug!(?report, "Background sync finished");
                }
            }
        })
    }

    fn next_wake(&self) -> Instant {
        let idle = Instant::now() + self.settings.sync_interval;
        match self.outbox().next_retry_at() {
            Some(retry) => retry.min(idle),
            None => idle,
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// Run a remote call under the configured timeout.
    async fn with_timeout<T>(
        &self,
        call: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        tokio::time::timeout(self.settings.remote_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(AppError::RemoteUnavailable(format!(
                    "remote call timed out after {:?}",
                    self.settings.remote_timeout
                )))
            })
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        // The queue stays consistent even if a holder panicked.
        self.outbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `edit` to the working copy and write it to the local cache.
    ///
    /// `edit` reports whether it changed anything. When the cache write
    /// fails the previous profile is restored and the error returned.
    fn commit(&self, edit: impl FnOnce(&mut Profile) -> bool) -> Result<bool, AppError> {
        let mut previous = None;
        self.state.send_if_modified(|p| {
            let before = p.clone();
            let changed = edit(p);
            if changed {
                previous = Some(before);
            }
            changed
        });
        let Some(previous) = previous else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            tracing::warn!(error = %e, "Local cache write failed, rolling back");
            self.state.send_replace(previous);
            return Err(e);
        }
        Ok(true)
    }

    /// Write the current snapshot and remote id to the local cache.
    fn persist(&self) -> Result<(), AppError> {
        let (raw, remote_id) = {
            let profile = self.state.borrow();
            let raw = serde_json::to_string(&*profile)
                .map_err(|e| AppError::Cache(format!("serialize profile: {}", e)))?;
            (raw, profile.remote_id.clone())
        };

        self.cache.set(keys::PROFILE, &raw)?;
        match remote_id {
            Some(id) => self.cache.set(keys::REMOTE_ID, &id),
            None => self.cache.remove(keys::REMOTE_ID),
        }
    }
}
