//! Durable key-value storage for the reading collection.
//!
//! A slot is one named text value. The file-backed store keeps each slot in
//! its own file:
//! ```text
//! <DATA_DIR>/
//!   glucoseReadings.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::models::Reading;

/// Default slot holding the reading collection.
pub const DEFAULT_SLOT_KEY: &str = "glucoseReadings";

/// Errors that can occur while reading or writing a slot.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid slot key: {0}")]
    InvalidKey(String),

    #[error("I/O error for {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] io::Error),

    #[error("Failed to serialize readings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A durable key-value medium holding text slots.
pub trait SlotStore {
    /// Returns `Ok(None)` if the slot has never been written.
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrites the slot in one step.
    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Rejects keys that would escape the storage directory.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.starts_with('.')
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Loads the readings held in `key`.
///
/// An absent slot and an unparseable slot both yield an empty collection;
/// the parse failure is logged but not returned.
pub fn load_readings<S: SlotStore + ?Sized>(store: &S, key: &str) -> Vec<Reading> {
    let contents = match store.read_slot(key) {
        Ok(Some(contents)) => contents,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!("Failed to read slot '{}': {}", key, e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Reading>>(&contents) {
        Ok(readings) => readings,
        Err(e) => {
            tracing::warn!("Discarding unparseable slot '{}': {}", key, e);
            Vec::new()
        }
    }
}

/// Serializes `readings` and overwrites `key`.
pub fn save_readings<S: SlotStore + ?Sized>(
    store: &S,
    key: &str,
    readings: &[Reading],
) -> Result<(), StoreError> {
    let json = serde_json::to_string(readings)?;
    store.write_slot(key, &json)
}

/// Slot store backed by one file per key in a data directory.
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    data_dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Returns the file path for a slot.
    pub fn path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl SlotStore for FileSlotStore {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let path = self.path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| StoreError::Io(self.data_dir.clone(), e))?;

        // Write atomically using temp file + rename
        let path = self.path(key);
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value).map_err(|e| StoreError::Io(temp_path.clone(), e))?;
        fs::rename(&temp_path, &path).map_err(|e| StoreError::Io(path, e))?;

        Ok(())
    }
}

/// In-memory slot store.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (FileSlotStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSlotStore::new(temp_dir.path().join("data"));
        (store, temp_dir)
    }

    fn sample_readings() -> Vec<Reading> {
        vec![
            Reading::new(120.0, "2024-03-05", "08:30", 1_709_627_400_000),
            Reading::new(65.5, "2024-03-04", "22:10", 1_709_590_200_000),
        ]
    }

    #[test]
    fn test_path() {
        let (store, _temp) = test_store();
        assert!(store.path(DEFAULT_SLOT_KEY).ends_with("glucoseReadings.json"));
    }

    #[test]
    fn test_load_missing_slot_is_empty() {
        let (store, _temp) = test_store();
        assert!(load_readings(&store, DEFAULT_SLOT_KEY).is_empty());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (store, _temp) = test_store();
        let readings = sample_readings();

        save_readings(&store, DEFAULT_SLOT_KEY, &readings).unwrap();
        let loaded = load_readings(&store, DEFAULT_SLOT_KEY);

        assert_eq!(loaded, readings);
    }

    #[test]
    fn test_save_overwrites_slot() {
        let (store, _temp) = test_store();
        let readings = sample_readings();

        save_readings(&store, DEFAULT_SLOT_KEY, &readings).unwrap();
        save_readings(&store, DEFAULT_SLOT_KEY, &readings[..1]).unwrap();

        assert_eq!(load_readings(&store, DEFAULT_SLOT_KEY).len(), 1);
        assert!(!store.path(DEFAULT_SLOT_KEY).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_slot_falls_back_to_empty() {
        let (store, _temp) = test_store();
        store.write_slot(DEFAULT_SLOT_KEY, "{not json").unwrap();

        assert!(load_readings(&store, DEFAULT_SLOT_KEY).is_empty());
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (store, _temp) = test_store();
        for key in ["", "../escape", "a/b", "a\\b", ".hidden"] {
            assert!(matches!(
                store.write_slot(key, "[]"),
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySlotStore::new();
        let readings = sample_readings();

        assert!(store.read_slot("glucoseReadings").unwrap().is_none());
        save_readings(&store, DEFAULT_SLOT_KEY, &readings).unwrap();
        assert_eq!(load_readings(&store, DEFAULT_SLOT_KEY), readings);
    }
}
