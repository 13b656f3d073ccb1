// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local profile store.
//!
//! Backs offline development (`REMOTE_BACKEND=memory`) and the test suite.
//! It can be switched offline or given artificial latency to exercise the
//! session's failure paths.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::db::{new_id, ProfileRepository};
use crate::error::AppError;
use crate::models::{CommunityPost, ProfileRow};
use crate::time_utils::format_utc_rfc3339;

/// In-memory profile store with a nickname uniqueness index.
#[derive(Default)]
pub struct MemoryDb {
    profiles: DashMap<String, ProfileRow>,
    /// nickname -> profile id
    nicknames: DashMap<String, String>,
    posts: DashMap<String, CommunityPost>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `RemoteUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every subsequent call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful write calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.posts.len()
    }

    pub fn get_post(&self, post_id: &str) -> Option<CommunityPost> {
        self.posts.get(post_id).map(|p| p.clone())
    }

    async fn enter(&self) -> Result<(), AppError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::RemoteUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Point `nickname` at `id`, failing if another profile holds it.
    fn claim_nickname(&self, nickname: &str, id: &str) -> Result<(), AppError> {
        match self.nicknames.entry(nickname.to_string()) {
            Entry::Occupied(entry) if entry.get() != id => Err(AppError::Conflict(format!(
                "nickname '{}' is already taken",
                nickname
            ))),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(id.to_string());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ProfileRepository for MemoryDb {
    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>, AppError> {
        self.enter().await?;
        Ok(self.profiles.get(id).map(|row| row.clone()))
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<ProfileRow>, AppError> {
        self.enter().await?;
        let id = match self.nicknames.get(nickname) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.profiles.get(&id).map(|row| row.clone()))
    }

    async fn list_by_points(&self, limit: u32) -> Result<Vec<ProfileRow>, AppError> {
        self.enter().await?;
        let mut rows: Vec<ProfileRow> = self.profiles.iter().map(|r| r.clone()).collect();
        rows.sort_by(|a, b| b.points.cmp(&a.points));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn insert_profile(&self, mut row: ProfileRow) -> Result<String, AppError> {
        self.enter().await?;
        row.id = new_id();
        self.claim_nickname(&row.nickname, &row.id)?;
        let id = row.id.clone();
        self.profiles.insert(id.clone(), row);
        self.record_write();
        Ok(id)
    }

    async fn update_profile(&self, row: &ProfileRow) -> Result<(), AppError> {
        self.enter().await?;
        self.claim_nickname(&row.nickname, &row.id)?;

        let previous_nickname = {
            let mut existing = self
                .profiles
                .get_mut(&row.id)
                .ok_or_else(|| AppError::NotFound(format!("profile {}", row.id)))?;
            let previous = std::mem::replace(&mut existing.nickname, row.nickname.clone());
            existing.sex = row.sex;
            existing.height_cm = row.height_cm;
            existing.weight_kg = row.weight_kg;
            existing.age = row.age;
            existing.activity = row.activity;
            existing.deficit_percent = row.deficit_percent;
            existing.track = row.track;
            existing.points = row.points;
            existing.bmr = row.bmr;
            existing.target_calories = row.target_calories;
            existing.status = row.status.clone();
            existing.updated_at = row.updated_at.clone();
            previous
        };

        if previous_nickname != row.nickname {
            self.nicknames.remove(&previous_nickname);
        }
        self.record_write();
        Ok(())
    }

    async fn update_credential(&self, id: &str, credential_hash: &str) -> Result<(), AppError> {
        self.enter().await?;
        let mut existing = self
            .profiles
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("profile {}", id)))?;
        existing.credential_hash = credential_hash.to_string();
        existing.updated_at = format_utc_rfc3339(chrono::Utc::now());
        drop(existing);
        self.record_write();
        Ok(())
    }

    async fn update_points(&self, id: &str, points: u32) -> Result<(), AppError> {
        self.enter().await?;
        let mut existing = self
            .profiles
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("profile {}", id)))?;
        existing.points = points;
        existing.updated_at = format_utc_rfc3339(chrono::Utc::now());
        drop(existing);
        self.record_write();
        Ok(())
    }

    async fn create_post(&self, post: &CommunityPost) -> Result<(), AppError> {
        self.enter().await?;
        self.posts.insert(post.id.clone(), post.clone());
        self.record_write();
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        self.enter().await?;
        self.posts.remove(post_id);
        self.record_write();
        Ok(())
    }

    async fn delete_posts_by_image(
        &self,
        profile_id: &str,
        image: &str,
    ) -> Result<usize, AppError> {
        self.enter().await?;
        let before = self.posts.len();
        self.posts
            .retain(|_, post| !(post.profile_id == profile_id && post.image == image));
        self.record_write();
        Ok(before - self.posts.len())
    }

    async fn list_posts(&self, limit: u32) -> Result<Vec<CommunityPost>, AppError> {
        self.enter().await?;
        let mut posts: Vec<CommunityPost> = self.posts.iter().map(|p| p.clone()).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        posts.truncate(limit as usize);
        Ok(posts)
    }
}
