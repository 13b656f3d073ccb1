// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Community post created for each submitted certification.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::certification::CertKind;

/// Stored post record (collection `posts`, keyed by certification id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CommunityPost {
    pub id: String,
    /// Owning profile's remote id
    pub profile_id: String,
    pub nickname: String,
    pub kind: CertKind,
    pub image: String,
    /// RFC3339, used for newest-first ordering
    pub created_at: String,
}
