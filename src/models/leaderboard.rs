// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard ranking over remote profile rows.
//!
//! Rows arrive ordered by points from the remote store; ranking is
//! recomputed here so ties are handled consistently.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::ProfileRow;

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    /// 1-based competition rank; tied scores share a rank
    pub rank: u32,
    pub nickname: String,
    pub points: u32,
    pub status: String,
    /// Whether this line is the current session's profile
    pub is_me: bool,
}

/// Rank rows by points (descending), breaking display ties by nickname.
///
/// Uses standard competition ranking ("1224"): equal points share a rank
/// and the next distinct score skips ahead.
pub fn rank_profiles(rows: &[ProfileRow], me: Option<&str>) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&ProfileRow> = rows.iter().collect();
    sorted.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.nickname.cmp(&b.nickname)));

    let mut entries = Vec::with_capacity(sorted.len());
    let mut rank = 0u32;
    let mut previous_points = None;

    for (position, row) in sorted.into_iter().enumerate() {
        if previous_points != Some(row.points) {
            rank = position as u32 + 1;
            previous_points = Some(row.points);
        }

        entries.push(LeaderboardEntry {
            rank,
            nickname: row.nickname.clone(),
            points: row.points,
            status: row.status.clone(),
            is_me: me == Some(row.id.as_str()),
        });
    }

    entries
}
