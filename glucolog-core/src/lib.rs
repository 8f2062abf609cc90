//! Glucolog Core Library
//!
//! Blood-glucose readings, their local storage, monthly export, and the
//! offline asset cache.

pub mod cache;
pub mod collection;
pub mod export;
pub mod form;
pub mod models;
pub mod store;

pub use collection::{CollectionError, ReadingCollection};
pub use export::{available_years, export_month, ExportError, ExportOutcome, MonthlyReport};
pub use form::{composite_timestamp, NewReading, ReadingInput, ValidationError};
pub use models::{GlucoseStatus, Notification, NotificationKind, Notifier, Reading, Severity};
pub use store::{FileSlotStore, MemorySlotStore, SlotStore, StoreError, DEFAULT_SLOT_KEY};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
