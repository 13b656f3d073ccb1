// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and reset buckets.

use chrono::{DateTime, Datelike, FixedOffset, Offset, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The fixed offset at which daily and monthly resets happen.
///
/// Out-of-range hours fall back to UTC.
pub fn reset_offset(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            tracing::warn!(hours, "Invalid reset offset, using UTC");
            Utc.fix()
        })
}

/// Month bucket in the reset offset, formatted `YYYY-M` (month not zero-padded).
pub fn month_bucket(now: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = now.with_timezone(&offset);
    format!("{}-{}", local.year(), local.month())
}

/// Day bucket in the reset offset, formatted `YYYY-MM-DD`.
pub fn day_bucket(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format("%Y-%m-%d").to_string()
}
