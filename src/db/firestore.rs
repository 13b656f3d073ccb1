// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Profiles (body metrics, points, credential hash)
//! - Posts (community feed entries created by certifications)

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::db::{collections, new_id, ProfileRepository};
use crate::error::AppError;
use crate::models::{CommunityPost, ProfileRow};
use crate::time_utils::format_utc_rfc3339;

const MAX_CONCURRENT_DB_OPS: usize = 10;

/// Partial write of the points column.
#[derive(Serialize, Deserialize)]
struct PointsPatch {
    points: u32,
    updated_at: String,
}

/// Partial write of the credential column.
#[derive(Serialize, Deserialize)]
struct CredentialPatch {
    credential_hash: String,
    updated_at: String,
}

/// Remote store for profile rows and community posts.
///
/// `client` is `None` when the session runs without a backend; every call
/// then fails as a transient remote error so the outbox keeps the work.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Connect to `project_id`, or to the emulator when
    /// `FIRESTORE_EMULATOR_HOST` is set.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// The emulator accepts any bearer token, so hand it an unsigned one.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::RemoteUnavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// A backend that is never reachable.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::RemoteUnavailable("remote store not configured".to_string())
        })
    }

    /// Fail with a conflict if `nickname` belongs to a profile other than `own_id`.
    async fn ensure_nickname_free(&self, nickname: &str, own_id: &str) -> Result<(), AppError> {
        match self.find_by_nickname(nickname).await? {
            Some(existing) if existing.id != own_id => Err(AppError::Conflict(format!(
                "nickname '{}' is already taken",
                nickname
            ))),
            _ => Ok(()),
        }
    }
}

fn db_err(e: firestore::errors::FirestoreError) -> AppError {
    AppError::RemoteUnavailable(e.to_string())
}

#[async_trait]
impl ProfileRepository for FirestoreDb {
    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn find_by_nickname(&self, nickname: &str) -> Result<Option<ProfileRow>, AppError> {
        let rows: Vec<ProfileRow> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(|q| q.field("nickname").eq(nickname))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().next())
    }

    async fn list_by_points(&self, limit: u32) -> Result<Vec<ProfileRow>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .order_by([("points", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn insert_profile(&self, mut row: ProfileRow) -> Result<String, AppError> {
        // Uniqueness is checked before the write; two simultaneous signups with
        // the same nickname can still race.
        self.ensure_nickname_free(&row.nickname, "").await?;

        row.id = new_id();

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&row.id)
            .object(&row)
            .execute()
            .await
            .map_err(db_err)?;

        tracing::info!(profile_id = %row.id, "Profile inserted");
        Ok(row.id)
    }

    async fn update_profile(&self, row: &ProfileRow) -> Result<(), AppError> {
        self.ensure_nickname_free(&row.nickname, &row.id).await?;

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(ProfileRow::{
                nickname,
                sex,
                height_cm,
                weight_kg,
                age,
                activity,
                deficit_percent,
                track,
                points,
                bmr,
                target_calories,
                status,
                updated_at
            }))
            .in_col(collections::PROFILES)
            .document_id(&row.id)
            .object(row)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_credential(&self, id: &str, credential_hash: &str) -> Result<(), AppError> {
        let patch = CredentialPatch {
            credential_hash: credential_hash.to_string(),
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(CredentialPatch::{credential_hash, updated_at}))
            .in_col(collections::PROFILES)
            .document_id(id)
            .object(&patch)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_points(&self, id: &str, points: u32) -> Result<(), AppError> {
        let patch = PointsPatch {
            points,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(firestore::paths!(PointsPatch::{points, updated_at}))
            .in_col(collections::PROFILES)
            .document_id(id)
            .object(&patch)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Post Operations ─────────────────────────────────────────

    async fn create_post(&self, post: &CommunityPost) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::POSTS)
            .document_id(&post.id)
            .object(post)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_post(&self, post_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::POSTS)
            .document_id(post_id)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_posts_by_image(
        &self,
        profile_id: &str,
        image: &str,
    ) -> Result<usize, AppError> {
        let client = self.get_client()?;

        let posts: Vec<CommunityPost> = client
            .fluent()
            .select()
            .from(collections::POSTS)
            .filter(|q| {
                q.for_all([
                    q.field("profile_id").eq(profile_id),
                    q.field("image").eq(image),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        let count = posts.len();

        stream::iter(posts)
            .map(|post| async move {
                client
                    .fluent()
                    .delete()
                    .from(collections::POSTS)
                    .document_id(&post.id)
                    .execute()
                    .await
                    .map_err(db_err)
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        tracing::debug!(profile_id, count, "Deleted posts by image");
        Ok(count)
    }

    async fn list_posts(&self, limit: u32) -> Result<Vec<CommunityPost>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::POSTS)
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }
}
