// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Non-durable cache for tests.
//!
//! Writes can be made to fail to exercise the store's rollback path.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::LocalCache;
use crate::error::AppError;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, String>,
    failing: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make every subsequent write fail with `AppError::Cache`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Cache("memory cache is read-only".to_string()));
        }
        Ok(())
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.check_writable()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.check_writable()?;
        self.entries.remove(key);
        Ok(())
    }
}
