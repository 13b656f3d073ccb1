// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Profile model: the local working copy and the remote row.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::certification::{CertKind, Certifications};
use crate::models::metrics::{derive_metrics, ActivityLevel, BodyMetrics, DerivedMetrics, Sex};
use crate::models::recommendation::Recommendation;

/// Status message given to new profiles.
pub const DEFAULT_STATUS: &str = "Stay healthy today!";

/// Which certification slots are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Diet,
    Workout,
    #[default]
    Both,
}

impl Track {
    pub fn as_str(self) -> &'static str {
        match self {
            Track::Diet => "diet",
            Track::Workout => "workout",
            Track::Both => "both",
        }
    }

    /// Whether certifications of `kind` count on this track.
    pub fn allows(self, kind: CertKind) -> bool {
        matches!(
            (self, kind),
            (Track::Both, _) | (Track::Diet, CertKind::Diet) | (Track::Workout, CertKind::Workout)
        )
    }
}

/// One body-composition measurement. Kept locally only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InbodyRecord {
    /// Measurement date (YYYY-MM-DD)
    #[validate(length(equal = 10))]
    pub date: String,
    #[validate(range(min = 20.0, max = 400.0))]
    pub weight_kg: f64,
    #[validate(range(min = 0.0, max = 200.0))]
    pub muscle_kg: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub body_fat_percent: Option<f64>,
}

/// The current user's fitness profile, as held in memory and in the
/// local cache.
///
/// Unknown or missing fields in a cached snapshot fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Remote row id, present once persisted
    pub remote_id: Option<String>,
    pub nickname: String,
    pub metrics: BodyMetrics,
    /// Always recomputed from `metrics`; `None` until computable
    pub derived: Option<DerivedMetrics>,
    pub track: Track,
    pub points: u32,
    pub certs: Certifications,
    pub status: String,
    pub inbody_records: Vec<InbodyRecord>,
    pub today_plan: Option<Recommendation>,
    /// Onboarding finished; gates the main application
    pub is_setup: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            remote_id: None,
            nickname: String::new(),
            metrics: BodyMetrics::default(),
            derived: None,
            track: Track::Both,
            points: 0,
            certs: Certifications::default(),
            status: DEFAULT_STATUS.to_string(),
            inbody_records: Vec::new(),
            today_plan: None,
            is_setup: false,
        }
    }
}

impl Profile {
    /// Recompute derived metrics from the current body metrics.
    pub fn recompute(&mut self) {
        self.derived = derive_metrics(&self.metrics);
    }

    /// Apply a signed point delta, clamping at zero. Returns the new total.
    pub fn apply_points_delta(&mut self, delta: i64) -> u32 {
        let next = (i64::from(self.points) + delta).clamp(0, i64::from(u32::MAX));
        self.points = next as u32;
        self.points
    }

    /// Build a fresh working copy from a remote row (login).
    ///
    /// Certifications and inbody history are local-only artifacts and start
    /// empty.
    pub fn from_row(row: &ProfileRow) -> Self {
        let mut profile = Profile {
            remote_id: Some(row.id.clone()),
            is_setup: true,
            ..Profile::default()
        };
        profile.apply_row_metrics(row);
        profile.apply_row_points(row);
        profile.recompute();
        profile
    }

    /// Copy the remote body metrics, nickname, track and status.
    pub fn apply_row_metrics(&mut self, row: &ProfileRow) {
        let activity = match ActivityLevel::try_from(row.activity) {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(profile_id = %row.id, error = %e, "Remote activity invalid, keeping local");
                self.metrics.activity
            }
        };

        self.nickname = row.nickname.clone();
        self.metrics = BodyMetrics {
            height_cm: Some(row.height_cm),
            weight_kg: Some(row.weight_kg),
            sex: row.sex,
            age: Some(row.age),
            activity,
            deficit_percent: row.deficit_percent,
        };
        self.track = row.track;
        self.status = row.status.clone();
    }

    pub fn apply_row_points(&mut self, row: &ProfileRow) {
        self.points = row.points;
    }

    /// Build the remote row for this profile.
    ///
    /// `credential_hash` is left empty; inserts fill it in and updates never
    /// write it.
    pub fn to_row(&self, id: &str, now: &str) -> ProfileRow {
        let derived = self.derived.unwrap_or(DerivedMetrics {
            bmr: 0,
            tdee: 0,
            target_calories: 0,
            macros: Default::default(),
        });

        ProfileRow {
            id: id.to_string(),
            nickname: self.nickname.clone(),
            credential_hash: String::new(),
            sex: self.metrics.sex,
            height_cm: self.metrics.height_cm.unwrap_or_default(),
            weight_kg: self.metrics.weight_kg.unwrap_or_default(),
            age: self.metrics.age.unwrap_or_default(),
            activity: self.metrics.activity.coefficient(),
            deficit_percent: self.metrics.deficit_percent,
            track: self.track,
            points: self.points,
            bmr: derived.bmr,
            target_calories: derived.target_calories,
            status: self.status.clone(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }
}

/// Longest accepted status message, in characters.
pub const MAX_STATUS_CHARS: usize = 100;

/// Trimmed status text; blank text falls back to [`DEFAULT_STATUS`].
pub fn normalize_status(raw: &str) -> &str {
    match raw.trim() {
        "" => DEFAULT_STATUS,
        trimmed => trimmed,
    }
}

/// Partial onboarding/settings payload. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 30))]
    pub nickname: Option<String>,
    /// Required when the profile has never been saved remotely
    pub credential: Option<String>,
    #[validate(range(min = 50.0, max = 300.0))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 20.0, max = 400.0))]
    pub weight_kg: Option<f64>,
    pub sex: Option<Sex>,
    #[validate(range(min = 1, max = 120))]
    pub age: Option<u32>,
    pub activity: Option<ActivityLevel>,
    #[validate(range(min = 1, max = 20))]
    pub deficit_percent: Option<u8>,
    pub track: Option<Track>,
    #[validate(length(max = 100))]
    pub status: Option<String>,
}

impl ProfileUpdate {
    /// Merge the payload into `profile` and recompute derived metrics.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(nickname) = &self.nickname {
            profile.nickname = nickname.trim().to_string();
        }
        let metrics = &mut profile.metrics;
        if let Some(height) = self.height_cm {
            metrics.height_cm = Some(height);
        }
        if let Some(weight) = self.weight_kg {
            metrics.weight_kg = Some(weight);
        }
        if let Some(sex) = self.sex {
            metrics.sex = sex;
        }
        if let Some(age) = self.age {
            metrics.age = Some(age);
        }
        if let Some(activity) = self.activity {
            metrics.activity = activity;
        }
        if let Some(deficit) = self.deficit_percent {
            metrics.deficit_percent = deficit;
        }
        if let Some(track) = self.track {
            profile.track = track;
        }
        if let Some(status) = &self.status {
            profile.status = normalize_status(status).to_string();
        }
        profile.recompute();
    }
}

/// Profile record in the remote store (collection `profiles`, keyed by id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    /// Unique across all profiles
    pub nickname: String,
    /// Salted credential hash, see `services::credential`
    #[serde(default)]
    pub credential_hash: String,
    pub sex: Sex,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age: u32,
    pub activity: f64,
    pub deficit_percent: u8,
    pub track: Track,
    pub points: u32,
    pub bmr: u32,
    pub target_calories: u32,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> ProfileRow {
        ProfileRow {
            id: "p-1".to_string(),
            nickname: "runner".to_string(),
            credential_hash: "hash".to_string(),
            sex: Sex::Female,
            height_cm: 160.0,
            weight_kg: 55.0,
            age: 30,
            activity: 1.55,
            deficit_percent: 15,
            track: Track::Diet,
            points: 120,
            bmr: 0,
            target_calories: 0,
            status: "hello".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_points_clamp_at_zero() {
        let mut profile = Profile::default();
        assert_eq!(profile.apply_points_delta(10), 10);
        assert_eq!(profile.apply_points_delta(-30), 0);
        assert_eq!(profile.apply_points_delta(10), 10);
    }

    #[test]
    fn test_from_row_recomputes_derived_metrics() {
        let profile = Profile::from_row(&sample_row());

        assert!(profile.is_setup);
        assert_eq!(profile.remote_id.as_deref(), Some("p-1"));
        assert_eq!(profile.points, 120);
        assert_eq!(profile.metrics.activity, ActivityLevel::Moderate);
        // Stored bmr of 0 is ignored in favor of a fresh computation.
        assert_eq!(profile.derived.unwrap().bmr, 1239);
        assert!(profile.certs.diet.is_empty());
    }

    #[test]
    fn test_update_merges_and_recomputes() {
        let mut profile = Profile::from_row(&sample_row());
        let update = ProfileUpdate {
            weight_kg: Some(60.0),
            ..ProfileUpdate::default()
        };

        update.apply_to(&mut profile);

        assert_eq!(profile.nickname, "runner");
        assert_eq!(profile.metrics.height_cm, Some(160.0));
        // 600 + 1000 - 150 - 161
        assert_eq!(profile.derived.unwrap().bmr, 1289);
        assert_eq!(profile.derived.unwrap().macros.protein_g, 90);
    }

    #[test]
    fn test_update_rejects_out_of_range() {
        let update = ProfileUpdate {
            deficit_percent: Some(25),
            ..ProfileUpdate::default()
        };
        assert!(update.validate().is_err());

        let update: ProfileUpdate =
            serde_json::from_str(r#"{"nickname":"a","activity":1.375,"deficit_percent":20}"#)
                .unwrap();
        assert!(update.validate().is_ok());
        assert_eq!(update.activity, Some(ActivityLevel::Light));
    }

    #[test]
    fn test_track_allows() {
        assert!(Track::Both.allows(CertKind::Diet));
        assert!(Track::Both.allows(CertKind::Workout));
        assert!(Track::Diet.allows(CertKind::Diet));
        assert!(!Track::Diet.allows(CertKind::Workout));
        assert!(!Track::Workout.allows(CertKind::Diet));
    }

    #[test]
    fn test_cached_snapshot_tolerates_missing_fields() {
        let profile: Profile = serde_json::from_str(r#"{"nickname":"old","points":30}"#).unwrap();
        assert_eq!(profile.nickname, "old");
        assert_eq!(profile.points, 30);
        assert_eq!(profile.track, Track::Both);
        assert_eq!(profile.status, DEFAULT_STATUS);
        assert!(!profile.is_setup);
    }

    #[test]
    fn test_blank_status_in_update_restores_default() {
        let mut profile = Profile {
            status: "tempo run".to_string(),
            ..Profile::default()
        };

        ProfileUpdate {
            status: Some("   ".to_string()),
            ..ProfileUpdate::default()
        }
        .apply_to(&mut profile);
        assert_eq!(profile.status, DEFAULT_STATUS);

        ProfileUpdate {
            status: Some("  hill repeats ".to_string()),
            ..ProfileUpdate::default()
        }
        .apply_to(&mut profile);
        assert_eq!(profile.status, "hill repeats");
    }
}
