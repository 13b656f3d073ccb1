// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local durable cache: a small per-device key/value store.

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::MemoryCache;

use crate::error::AppError;

/// Logical keys held in the local cache.
pub mod keys {
    /// Serialized [`crate::models::Profile`] snapshot
    pub const PROFILE: &str = "profile";
    /// Remote row id of the session's profile
    pub const REMOTE_ID: &str = "remote_id";
    /// Month bucket (`YYYY-M`) of the last monthly reset
    pub const LAST_RESET_MONTH: &str = "last_reset_month";
    /// Day bucket (`YYYY-MM-DD`) of the last daily reset
    pub const LAST_RESET_DAY: &str = "last_reset_day";
}

/// Key to string storage. Calls never suspend.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), AppError>;
}
