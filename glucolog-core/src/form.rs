//! Validation of raw reading input.
//!
//! Turns the three raw strings a user types (level, date, time) into a
//! normalized creation request, and derives the composite timestamp used to
//! order readings.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use thiserror::Error;

use crate::models::Reading;

/// Errors surfaced to the user when a reading cannot be created.
///
/// The messages are shown verbatim, so they stay in the application locale.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("El nivel de glucosa debe ser un número positivo.")]
    InvalidLevel,

    #[error("Por favor, seleccione una fecha.")]
    MissingDate,

    #[error("Por favor, seleccione una hora.")]
    MissingTime,

    #[error("Fecha u hora inválida.")]
    InvalidDateTime,
}

/// Raw field values as entered.
#[derive(Debug, Clone, Default)]
pub struct ReadingInput {
    pub glucose_level: String,
    pub date: String,
    pub time: String,
}

/// A validated creation request, not yet stamped with an id or timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub glucose_level: f64,
    pub date: String,
    pub time: String,
}

impl ReadingInput {
    pub fn new(
        glucose_level: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            glucose_level: glucose_level.into(),
            date: date.into(),
            time: time.into(),
        }
    }

    /// Checks the fields in the order the form reports them: level, date, time.
    pub fn validate(&self) -> Result<NewReading, ValidationError> {
        let level = parse_level(&self.glucose_level)?;

        let date = self.date.trim();
        if date.is_empty() {
            return Err(ValidationError::MissingDate);
        }
        let time = self.time.trim();
        if time.is_empty() {
            return Err(ValidationError::MissingTime);
        }

        Ok(NewReading {
            glucose_level: level,
            date: date.to_string(),
            time: time.to_string(),
        })
    }
}

impl NewReading {
    /// Stamps the request with a fresh id and its timestamp in `tz`.
    ///
    /// The stored date and time are rewritten as `YYYY-MM-DD` and `HH:MM`
    /// whatever padding or seconds the input carried.
    pub fn into_reading<Tz: TimeZone>(self, tz: &Tz) -> Result<Reading, ValidationError> {
        let local = parse_local(&self.date, &self.time)?;
        let timestamp = local_millis(&local, tz)?;
        Ok(Reading::new(
            self.glucose_level,
            local.format("%Y-%m-%d").to_string(),
            local.format("%H:%M").to_string(),
            timestamp,
        ))
    }
}

fn parse_level(raw: &str) -> Result<f64, ValidationError> {
    match raw.trim().parse::<f64>() {
        Ok(level) if level.is_finite() && level > 0.0 => Ok(level),
        _ => Err(ValidationError::InvalidLevel),
    }
}

/// Epoch milliseconds of `date` (`YYYY-MM-DD`) at `time` (`HH:MM` or
/// `HH:MM:SS`) in the given time zone.
///
/// Local times skipped by a DST transition are rejected; ambiguous ones
/// resolve to the earlier instant.
pub fn composite_timestamp<Tz: TimeZone>(
    date: &str,
    time: &str,
    tz: &Tz,
) -> Result<i64, ValidationError> {
    local_millis(&parse_local(date, time)?, tz)
}

fn parse_local(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDateTime)?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|_| ValidationError::InvalidDateTime)?;
    Ok(NaiveDateTime::new(date, time))
}

fn local_millis<Tz: TimeZone>(local: &NaiveDateTime, tz: &Tz) -> Result<i64, ValidationError> {
    tz.from_local_datetime(local)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .ok_or(ValidationError::InvalidDateTime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};

    #[test]
    fn test_validate_accepts_valid_input() {
        let request = ReadingInput::new("120", "2024-03-05", "08:30")
            .validate()
            .unwrap();

        assert_eq!(request.glucose_level, 120.0);
        assert_eq!(request.date, "2024-03-05");
        assert_eq!(request.time, "08:30");
    }

    #[test]
    fn test_validate_rejects_non_positive_level() {
        for raw in ["0", "-5", "", "abc", "NaN", "inf"] {
            let err = ReadingInput::new(raw, "2024-03-05", "08:30")
                .validate()
                .unwrap_err();
            assert_eq!(err, ValidationError::InvalidLevel, "input {:?}", raw);
        }
        assert_eq!(
            ValidationError::InvalidLevel.to_string(),
            "El nivel de glucosa debe ser un número positivo."
        );
    }

    #[test]
    fn test_validate_reports_missing_date_before_time() {
        let err = ReadingInput::new("100", "", "").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingDate);

        let err = ReadingInput::new("100", "2024-03-05", "  ")
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTime);
    }

    #[test]
    fn test_composite_timestamp_utc() {
        let ts = composite_timestamp("2024-03-05", "08:30", &Utc).unwrap();
        assert_eq!(ts, 1_709_627_400_000);

        let with_seconds = composite_timestamp("2024-03-05", "08:30:00", &Utc).unwrap();
        assert_eq!(with_seconds, ts);
    }

    #[test]
    fn test_composite_timestamp_local() {
        let ts = composite_timestamp("2024-03-05", "08:30", &Local).unwrap();
        let expected = Local
            .with_ymd_and_hms(2024, 3, 5, 8, 30, 0)
            .earliest()
            .unwrap()
            .timestamp_millis();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_composite_timestamp_rejects_garbage() {
        assert_eq!(
            composite_timestamp("2024-13-40", "08:30", &Utc),
            Err(ValidationError::InvalidDateTime)
        );
        assert_eq!(
            composite_timestamp("2024-03-05", "25:00", &Utc),
            Err(ValidationError::InvalidDateTime)
        );
    }

    #[test]
    fn test_into_reading() {
        let reading = ReadingInput::new("95.5", "2024-03-05", "08:30")
            .validate()
            .unwrap()
            .into_reading(&Utc)
            .unwrap();

        assert_eq!(reading.glucose_level, 95.5);
        assert_eq!(reading.timestamp, 1_709_627_400_000);
        assert!(!reading.id.is_empty());
    }

    #[test]
    fn test_into_reading_normalizes_date_and_time() {
        let reading = ReadingInput::new("120", "2024-3-5", "8:30")
            .validate()
            .unwrap()
            .into_reading(&Utc)
            .unwrap();

        assert_eq!(reading.date, "2024-03-05");
        assert_eq!(reading.time, "08:30");
        assert_eq!(reading.timestamp, 1_709_627_400_000);
    }

    #[test]
    fn test_into_reading_drops_seconds_from_stored_time() {
        let reading = ReadingInput::new("130", "2024-03-06", "08:30:00")
            .validate()
            .unwrap()
            .into_reading(&Utc)
            .unwrap();

        assert_eq!(reading.date, "2024-03-06");
        assert_eq!(reading.time, "08:30");
    }
}
