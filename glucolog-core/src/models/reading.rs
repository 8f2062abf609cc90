use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::glucose_status::GlucoseStatus;

const MONTH_NAMES_LOWERCASE: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// A single blood-glucose measurement.
///
/// Field names are serialized in camelCase so slots written by earlier
/// versions of the logger load unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub glucose_level: f64,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Clock time, 24h `HH:MM`
    pub time: String,
    /// Epoch milliseconds of `date` + `time` in local time
    pub timestamp: i64,
}

impl Reading {
    pub fn new(
        glucose_level: f64,
        date: impl Into<String>,
        time: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            glucose_level,
            date: date.into(),
            time: time.into(),
            timestamp,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn status(&self) -> GlucoseStatus {
        GlucoseStatus::classify(self.glucose_level)
    }

    /// Four-digit year prefix of the date, if present.
    pub fn year(&self) -> Option<&str> {
        self.date.get(0..4)
    }

    /// Long Spanish rendering of the date, e.g. `5 de marzo de 2024`.
    ///
    /// Falls back to the raw string when the stored date does not parse.
    pub fn long_date(&self) -> String {
        match NaiveDate::parse_from_str(&self.date, "%Y-%m-%d") {
            Ok(date) => {
                use chrono::Datelike;
                format!(
                    "{} de {} de {}",
                    date.day(),
                    MONTH_NAMES_LOWERCASE[date.month0() as usize],
                    date.year()
                )
            }
            Err(_) => self.date.clone(),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} mg/dL", self.glucose_level)?;
        writeln!(f, "  {}", self.status().label())?;
        write!(f, "  {} - {}", self.long_date(), self.time)
    }
}
