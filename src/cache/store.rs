//! Key-value storage behind the calendar cache
//!
//! The cache persists each entry as two string slots, the JSON payload and
//! its write timestamp. [`FileStore`] keeps them as files in the XDG cache
//! directory so they survive between runs; [`MemoryStore`] keeps them in a
//! map for tests and embedding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use tracing::debug;

use super::entry::{CacheEntry, CacheKey};
use crate::data::Event;
use crate::error::StoreError;

/// String key-value storage
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored slots
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // A poisoned map still holds consistent strings
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Stores each slot as a file on disk
///
/// Uses `~/.cache/staffcal/` on Linux, or the equivalent XDG path on other
/// platforms.
#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    /// Creates a store in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "staffcal")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a store rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.slot_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.slot_path(key), value)?;
        Ok(())
    }
}

/// Loads the entry for `key`
///
/// Returns `None` when either slot is missing or unparseable, so a partially
/// written entry reads as absent.
pub fn read_entry(store: &dyn KeyValueStore, key: &CacheKey) -> Option<CacheEntry> {
    let stored_at_millis = store.get(&key.time_key())?.trim().parse::<i64>().ok()?;
    let raw = store.get(&key.payload_key())?;
    match serde_json::from_str::<Vec<Event>>(&raw) {
        Ok(payload) => Some(CacheEntry {
            payload,
            stored_at_millis,
        }),
        Err(e) => {
            debug!(%key, error = %e, "Ignoring unreadable cache payload");
            None
        }
    }
}

/// Replaces the entry for `key`
///
/// The timestamp slot is blanked before the payload is replaced and only
/// filled in last. If any step fails the entry reads as absent rather than
/// pairing one write's payload with another write's timestamp.
pub fn write_entry(
    store: &dyn KeyValueStore,
    key: &CacheKey,
    entry: &CacheEntry,
) -> Result<(), StoreError> {
    let payload = serde_json::to_string(&entry.payload)?;
    let time_key = key.time_key();
    store.set(&time_key, "")?;
    store.set(&key.payload_key(), &payload)?;
    store.set(&time_key, &entry.stored_at_millis.to_string())
}
