//! Cross-process key-value store
//!
//! The store has per-key last-write-wins semantics, no cross-key atomicity
//! and no change notification. Readers poll. Only [`SyncBridge`] touches raw
//! keys; everything else goes through its typed interface.
//!
//! [`SyncBridge`]: super::SyncBridge

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::error::{Error, Result};

/// Raw key-value access shared by both processes.
pub trait SharedStore: Send + Sync {
    /// Read a key. `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a key. Other keys are untouched.
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// File-backed store: one JSON file per key in a directory both processes
/// can reach.
///
/// Each key is replaced with write-to-temp + rename, so a reader sees either
/// the old or the new value of a key, never a torn one. Nothing spans keys.
pub struct FileSharedStore {
    dir: PathBuf,
}

impl FileSharedStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SharedStore for FileSharedStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::SharedStore(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let value = serde_json::from_str(&content)?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.key_path(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", key, std::process::id()));

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value.to_string().as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::SharedStore(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

/// In-process store for tests and single-process setups.
///
/// Can simulate an unavailable store and per-key write failures.
#[derive(Default)]
pub struct MemorySharedStore {
    values: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemorySharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read and write fail until re-enabled.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Make writes to `key` fail (reads still work).
    pub fn fail_writes_to(&self, key: &str, failing: bool) {
        let mut keys = self
            .failing_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if failing {
            keys.insert(key.to_string());
        } else {
            keys.remove(key);
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::SharedStore("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl SharedStore for MemorySharedStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_available()?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_available()?;
        let failing = self
            .failing_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key);
        if failing {
            return Err(Error::SharedStore(format!("write to {} failed", key)));
        }
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        Ok(())
    }
}

impl<T: SharedStore + ?Sized> SharedStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileSharedStore::open(dir.path()).unwrap();

        assert_eq!(store.get("todayWaterAmount").unwrap(), None);
        store.set("todayWaterAmount", json!(800)).unwrap();
        store.set("isWidgetUpdate", json!(true)).unwrap();

        assert_eq!(store.get("todayWaterAmount").unwrap(), Some(json!(800)));
        assert_eq!(store.get("isWidgetUpdate").unwrap(), Some(json!(true)));
        assert!(dir.path().join("todayWaterAmount.json").exists());
    }

    #[test]
    fn test_file_store_visible_across_handles() {
        let dir = TempDir::new().unwrap();
        let writer = FileSharedStore::open(dir.path()).unwrap();
        let reader = FileSharedStore::open(dir.path()).unwrap();

        writer.set("dailyGoal", json!(2000)).unwrap();
        writer.set("dailyGoal", json!(2500)).unwrap();
        assert_eq!(reader.get("dailyGoal").unwrap(), Some(json!(2500)));
    }

    #[test]
    fn test_file_store_corrupt_value_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileSharedStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("dailyGoal.json"), "{not json").unwrap();
        assert!(store.get("dailyGoal").is_err());
    }

    #[test]
    fn test_memory_store_failure_modes() {
        let store = MemorySharedStore::new();
        store.set("a", json!(1)).unwrap();

        store.fail_writes_to("a", true);
        assert!(store.set("a", json!(2)).is_err());
        assert_eq!(store.get("a").unwrap(), Some(json!(1)));
        store.fail_writes_to("a", false);

        store.set_available(false);
        assert!(store.get("a").is_err());
        store.set_available(true);
        assert_eq!(store.get("a").unwrap(), Some(json!(1)));
    }
}
