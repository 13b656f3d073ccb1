// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod certification;
pub mod leaderboard;
pub mod metrics;
pub mod post;
pub mod profile;
pub mod recommendation;

pub use certification::{CertKind, Certification, Certifications};
pub use leaderboard::LeaderboardEntry;
pub use metrics::{derive_metrics, ActivityLevel, BodyMetrics, DerivedMetrics, Macros, Sex};
pub use post::CommunityPost;
pub use profile::{InbodyRecord, Profile, ProfileRow, ProfileUpdate, Track};
pub use recommendation::{MealSuggestion, Recommendation, WorkoutSuggestion};
