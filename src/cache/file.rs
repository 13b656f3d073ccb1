// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File backed cache.
//!
//! Each key lives in its own `<key>.entry` file under the cache directory,
//! mirrored in memory for reads. A write replaces only that file, through a
//! temporary sibling and a rename, and is skipped when the value is
//! unchanged. The profile snapshot can carry several large certification
//! images, so the small marker and id keys never rewrite it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::cache::LocalCache;
use crate::error::AppError;

const ENTRY_EXT: &str = "entry";

pub struct FileCache {
    dir: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl FileCache {
    /// Open (or create) the cache in `dir`.
    ///
    /// Unreadable entries are skipped with a warning; the cache is a
    /// convenience copy, never the only copy of anything.
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Cache(format!("create {}: {}", dir.display(), e)))?;

        let listing = fs::read_dir(dir)
            .map_err(|e| AppError::Cache(format!("list {}: {}", dir.display(), e)))?;

        let mut entries = BTreeMap::new();
        for item in listing.flatten() {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !valid_key(key) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(value) => {
                    entries.insert(key.to_string(), value);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }

        tracing::debug!(dir = %dir.display(), keys = entries.len(), "Local cache opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Cache("cache lock poisoned".to_string()))
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, AppError> {
        if !valid_key(key) {
            return Err(AppError::Cache(format!("invalid cache key '{}'", key)));
        }
        Ok(self.dir.join(format!("{key}.{ENTRY_EXT}")))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let path = self.entry_path(key)?;
        let mut entries = self.lock()?;
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }

        let tmp = path.with_extension(format!("{ENTRY_EXT}.tmp"));
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| AppError::Cache(format!("write {}: {}", path.display(), e)))?;

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.entry_path(key)?;
        let mut entries = self.lock()?;
        if !entries.contains_key(key) {
            return Ok(());
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::Cache(format!("remove {}: {}", path.display(), e))),
        }
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let cache = FileCache::open(dir.path()).unwrap();
        cache.set(keys::REMOTE_ID, "abc").unwrap();
        cache.set(keys::LAST_RESET_DAY, "2026-03-01").unwrap();
        cache.remove(keys::LAST_RESET_DAY).unwrap();
        drop(cache);

        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get(keys::REMOTE_ID).unwrap().as_deref(), Some("abc"));
        assert!(reopened.get(keys::LAST_RESET_DAY).unwrap().is_none());
    }

    #[test]
    fn test_each_key_has_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        cache.set(keys::PROFILE, "{}").unwrap();
        cache.set(keys::REMOTE_ID, "abc").unwrap();

        let profile_path = dir.path().join("profile.entry");
        assert_eq!(fs::read_to_string(&profile_path).unwrap(), "{}");
        assert_eq!(
            fs::read_to_string(dir.path().join("remote_id.entry")).unwrap(),
            "abc"
        );

        // Unchanged values are not written again.
        fs::remove_file(&profile_path).unwrap();
        cache.set(keys::PROFILE, "{}").unwrap();
        assert!(!profile_path.exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.set(keys::PROFILE, "old").unwrap();

        // A directory where the temporary file belongs makes the write fail.
        fs::create_dir(dir.path().join("profile.entry.tmp")).unwrap();
        let err = cache.set(keys::PROFILE, "new").unwrap_err();

        assert!(matches!(err, AppError::Cache(_)));
        assert_eq!(cache.get(keys::PROFILE).unwrap().as_deref(), Some("old"));
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("profile.entry"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("remote_id.entry"), "abc").unwrap();

        let cache = FileCache::open(dir.path()).unwrap();
        assert!(cache.get(keys::PROFILE).unwrap().is_none());
        assert_eq!(cache.get(keys::REMOTE_ID).unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        assert!(cache.set("../escape", "x").is_err());
        cache.remove("nothing").unwrap();
    }
}
