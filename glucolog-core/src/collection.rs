//! The reading collection manager.
//!
//! Owns the in-memory readings, writes the whole collection through to its
//! slot after every mutation, and reports each outcome as a notification.

use chrono::{Local, TimeZone};
use thiserror::Error;

use crate::form::{ReadingInput, ValidationError};
use crate::models::{Notification, Notifier, Reading};
use crate::store::{load_readings, save_readings, SlotStore, StoreError};

pub const MSG_SAVED: &str = "Medición guardada exitosamente.";
pub const MSG_DELETED: &str = "Medición eliminada.";
pub const MSG_SAVE_FAILED: &str = "Error al guardar la medición.";

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist readings: {0}")]
    Storage(#[from] StoreError),
}

/// Readings kept equal to their persisted slot.
pub struct ReadingCollection<S, Tz: TimeZone = Local> {
    store: S,
    key: String,
    tz: Tz,
    readings: Vec<Reading>,
    notifier: Notifier,
}

impl<S: SlotStore> ReadingCollection<S, Local> {
    /// Loads the collection held in `key`, interpreting times as local.
    pub fn load(store: S, key: impl Into<String>) -> Self {
        Self::load_in(store, key, Local)
    }
}

impl<S: SlotStore, Tz: TimeZone> ReadingCollection<S, Tz> {
    /// Loads the collection held in `key`, interpreting times in `tz`.
    pub fn load_in(store: S, key: impl Into<String>, tz: Tz) -> Self {
        let key = key.into();
        let readings = load_readings(&store, &key);
        tracing::debug!("Loaded {} reading(s) from slot '{}'", readings.len(), key);

        Self {
            store,
            key,
            tz,
            readings,
            notifier: Notifier::new(),
        }
    }

    /// Validates `input`, appends the new reading and persists.
    ///
    /// Validation failures never touch the collection or the slot.
    pub fn add(&mut self, input: &ReadingInput) -> Result<Reading, CollectionError> {
        let reading = match input
            .validate()
            .and_then(|request| request.into_reading(&self.tz))
        {
            Ok(reading) => reading,
            Err(e) => {
                self.notifier.show(Notification::error(e.to_string()));
                return Err(e.into());
            }
        };

        let previous = self.readings.clone();
        self.readings.push(reading.clone());
        sort_descending(&mut self.readings);

        if let Err(e) = self.persist() {
            self.readings = previous;
            self.notifier.show(Notification::error(MSG_SAVE_FAILED));
            return Err(e.into());
        }

        self.notifier.show(Notification::success(MSG_SAVED));
        Ok(reading)
    }

    /// Removes the reading with `id`. A missing id is not an error.
    ///
    /// Returns whether a reading was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool, CollectionError> {
        let previous = self.readings.clone();
        let previous_len = previous.len();
        self.readings.retain(|r| r.id != id);

        if let Err(e) = self.persist() {
            self.readings = previous;
            self.notifier.show(Notification::error(MSG_SAVE_FAILED));
            return Err(e.into());
        }

        self.notifier.show(Notification::success(MSG_DELETED));
        Ok(self.readings.len() != previous_len)
    }

    /// All readings, most recent first. Ties keep insertion order.
    pub fn sorted_view(&self) -> Vec<Reading> {
        let mut view = self.readings.clone();
        sort_descending(&mut view);
        view
    }

    pub fn get(&self, id: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.id == id)
    }

    /// Readings in storage order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    fn persist(&self) -> Result<(), StoreError> {
        save_readings(&self.store, &self.key, &self.readings)
    }
}

fn sort_descending(readings: &mut [Reading]) {
    readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use crate::store::{FileSlotStore, MemorySlotStore, DEFAULT_SLOT_KEY};
    use chrono::Utc;
    use tempfile::TempDir;

    /// Slot store whose writes always fail.
    struct ReadOnlyStore;

    impl SlotStore for ReadOnlyStore {
        fn read_slot(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn write_slot(&self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }
    }

    fn collection() -> ReadingCollection<MemorySlotStore, Utc> {
        ReadingCollection::load_in(MemorySlotStore::new(), DEFAULT_SLOT_KEY, Utc)
    }

    fn input(level: &str, date: &str, time: &str) -> ReadingInput {
        ReadingInput::new(level, date, time)
    }

    #[test]
    fn test_add_valid_reading() {
        let mut readings = collection();
        let added = readings.add(&input("120", "2024-03-05", "08:30")).unwrap();

        assert_eq!(readings.len(), 1);
        assert_eq!(added.timestamp, 1_709_627_400_000);
        assert_eq!(added.status().label(), "Normal");

        let notification = readings.notifier().last().unwrap();
        assert_eq!(notification.kind, NotificationKind::Success);
        assert_eq!(notification.message, MSG_SAVED);
    }

    #[test]
    fn test_add_local_time_matches_local_epoch() {
        let mut readings = ReadingCollection::load(MemorySlotStore::new(), DEFAULT_SLOT_KEY);
        let added = readings.add(&input("120", "2024-03-05", "08:30")).unwrap();

        let expected = Local
            .with_ymd_and_hms(2024, 3, 5, 8, 30, 0)
            .earliest()
            .unwrap()
            .timestamp_millis();
        assert_eq!(added.timestamp, expected);
    }

    #[test]
    fn test_add_zero_level_rejected() {
        let mut readings = collection();
        let err = readings.add(&input("0", "2024-03-05", "08:30")).unwrap_err();

        assert!(matches!(
            err,
            CollectionError::Validation(ValidationError::InvalidLevel)
        ));
        assert!(readings.is_empty());

        let notification = readings.notifier().last().unwrap();
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(
            notification.message,
            "El nivel de glucosa debe ser un número positivo."
        );
    }

    #[test]
    fn test_add_invalid_datetime_not_persisted() {
        let store_dir = TempDir::new().unwrap();
        let store = FileSlotStore::new(store_dir.path());
        let mut readings = ReadingCollection::load_in(store.clone(), DEFAULT_SLOT_KEY, Utc);

        let err = readings.add(&input("100", "2024-02-31", "08:30")).unwrap_err();

        assert_eq!(err.to_string(), "Fecha u hora inválida.");
        assert!(!store.path(DEFAULT_SLOT_KEY).exists());
    }

    #[test]
    fn test_unpadded_input_is_stored_canonically_and_exported() {
        let mut readings = collection();
        let added = readings.add(&input("120", "2024-3-5", "8:30")).unwrap();
        readings.add(&input("130", "2024-03-06", "08:30:00")).unwrap();

        assert_eq!(added.date, "2024-03-05");
        assert_eq!(added.time, "08:30");

        let outcome = crate::export::export_month(readings.readings(), "2024", "03").unwrap();
        let crate::export::ExportOutcome::Report(report) = outcome else {
            panic!("expected a report");
        };
        assert_eq!(report.count, 2);
        assert!(report.content.contains("05/03/2024 08:30 - Nivel: 120 mg/dL\n"));
        assert!(report.content.contains("06/03/2024 08:30 - Nivel: 130 mg/dL\n"));
    }

    #[test]
    fn test_sorted_view_descending_and_stable() {
        let mut readings = collection();
        readings.add(&input("100", "2024-03-05", "08:30")).unwrap();
        readings.add(&input("110", "2024-03-06", "08:30")).unwrap();
        let first_tie = readings.add(&input("90", "2024-03-04", "12:00")).unwrap();
        let second_tie = readings.add(&input("95", "2024-03-04", "12:00")).unwrap();

        let view = readings.sorted_view();
        assert!(view
            .windows(2)
            .all(|pair| pair[0].timestamp >= pair[1].timestamp));
        assert_eq!(view[0].glucose_level, 110.0);
        assert_eq!(view[2].id, first_tie.id);
        assert_eq!(view[3].id, second_tie.id);
    }

    #[test]
    fn test_delete_removes_reading() {
        let mut readings = collection();
        let keep = readings.add(&input("100", "2024-03-05", "08:30")).unwrap();
        let gone = readings.add(&input("150", "2024-03-06", "09:00")).unwrap();

        assert!(readings.delete(&gone.id).unwrap());

        let view = readings.sorted_view();
        assert!(view.iter().all(|r| r.id != gone.id));
        assert_eq!(view[0].id, keep.id);
        assert_eq!(readings.notifier().last().unwrap().message, MSG_DELETED);
    }

    #[test]
    fn test_delete_unknown_id_is_silent() {
        let mut readings = collection();
        readings.add(&input("100", "2024-03-05", "08:30")).unwrap();
        let before = readings.sorted_view();

        assert!(!readings.delete("no-such-id").unwrap());
        assert_eq!(readings.sorted_view(), before);
        assert_eq!(
            readings.notifier().last().unwrap().kind,
            NotificationKind::Success
        );
    }

    #[test]
    fn test_mutations_write_through() {
        let store_dir = TempDir::new().unwrap();
        let store = FileSlotStore::new(store_dir.path());

        let mut readings = ReadingCollection::load_in(store.clone(), DEFAULT_SLOT_KEY, Utc);
        let first = readings.add(&input("100", "2024-03-05", "08:30")).unwrap();
        readings.add(&input("130", "2024-03-06", "08:30")).unwrap();
        readings.delete(&first.id).unwrap();

        let reloaded = ReadingCollection::load_in(store, DEFAULT_SLOT_KEY, Utc);
        assert_eq!(reloaded.readings(), readings.readings());
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let mut readings = ReadingCollection::load_in(ReadOnlyStore, DEFAULT_SLOT_KEY, Utc);
        let err = readings.add(&input("100", "2024-03-05", "08:30")).unwrap_err();

        assert!(matches!(err, CollectionError::Storage(_)));
        assert!(readings.is_empty());
        assert_eq!(readings.notifier().last().unwrap().message, MSG_SAVE_FAILED);
    }
}
