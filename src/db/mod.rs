// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote profile service: the repository seam and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{CommunityPost, ProfileRow};

/// Collection names as constants.
pub mod collections {
    /// Profile rows (keyed by profile id)
    pub const PROFILES: &str = "profiles";
    /// Community posts (keyed by certification id)
    pub const POSTS: &str = "posts";
}

/// Operations the session needs from the remote profile store.
///
/// Implementations enforce nickname uniqueness and report it as
/// [`AppError::Conflict`]. Transport failures are
/// [`AppError::RemoteUnavailable`].
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Point lookup by id.
    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>, AppError>;

    /// Lookup by exact nickname.
    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<ProfileRow>, AppError>;

    /// All profiles ordered by points, highest first.
    async fn list_by_points(&self, limit: u32) -> Result<Vec<ProfileRow>, AppError>;

    /// Insert a new row under a freshly generated id and return that id.
    ///
    /// `row.id` is ignored.
    async fn insert_profile(&self, row: ProfileRow) -> Result<String, AppError>;

    /// Update every mutable column of `row.id` except the credential hash
    /// and creation time.
    async fn update_profile(&self, row: &ProfileRow) -> Result<(), AppError>;

    async fn update_credential(&self, id: &str, credential_hash: &str) -> Result<(), AppError>;

    /// Direct write of the points column.
    async fn update_points(&self, id: &str, points: u32) -> Result<(), AppError>;

    async fn create_post(&self, post: &CommunityPost) -> Result<(), AppError>;

    async fn delete_post(&self, post_id: &str) -> Result<(), AppError>;

    /// Fallback delete for posts whose id was never tracked.
    ///
    /// Returns the number of posts removed.
    async fn delete_posts_by_image(&self, profile_id: &str, image: &str)
        -> Result<usize, AppError>;

    /// Community feed, newest first.
    async fn list_posts(&self, limit: u32) -> Result<Vec<CommunityPost>, AppError>;
}

/// Generate a new remote id.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
