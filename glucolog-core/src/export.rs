//! Monthly plain-text report of readings.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Reading;

pub const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// MIME type of the exported document.
pub const EXPORT_MIME: &str = "text/plain";

const RULE: &str = "=================================";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("Invalid year '{0}'. Use YYYY.")]
    InvalidYear(String),

    #[error("Invalid month '{0}'. Use 01-12.")]
    InvalidMonth(String),
}

/// A report ready to be written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    pub file_name: String,
    pub content: String,
    pub count: usize,
}

impl MonthlyReport {
    /// Writes the report into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, self.content.as_bytes())?;
        Ok(path)
    }
}

/// Result of an export request. An empty month is not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Report(MonthlyReport),
    Empty { message: String },
}

/// Builds the report for readings dated in `year`-`month`.
///
/// `year` is four digits and `month` two digits (`01`-`12`). Lines are in
/// chronological order.
pub fn export_month(
    readings: &[Reading],
    year: &str,
    month: &str,
) -> Result<ExportOutcome, ExportError> {
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(ExportError::InvalidYear(year.to_string()));
    }
    let month_name = month_name(month).ok_or_else(|| ExportError::InvalidMonth(month.to_string()))?;

    let prefix = format!("{}-{}", year, month);
    let mut selected: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.date.starts_with(&prefix))
        .collect();

    if selected.is_empty() {
        return Ok(ExportOutcome::Empty {
            message: format!(
                "No hay mediciones registradas para {} de {}.",
                month_name, year
            ),
        });
    }

    selected.sort_by_key(|r| r.timestamp);

    let mut content = format!("Informe de Glucosa: {} {}\n", month_name, year);
    content.push_str(RULE);
    content.push('\n');
    for reading in &selected {
        content.push_str(&format!(
            "{} {} - Nivel: {} mg/dL\n",
            short_date(&reading.date),
            reading.time,
            reading.glucose_level
        ));
    }
    content.push_str(RULE);
    content.push('\n');
    content.push_str(&format!("Total de mediciones: {}\n", selected.len()));

    Ok(ExportOutcome::Report(MonthlyReport {
        file_name: format!(
            "mediciones_glucosa_{}_{}.txt",
            month_name.to_uppercase(),
            year
        ),
        content,
        count: selected.len(),
    }))
}

/// Years that have readings, plus `current_year`, newest first.
pub fn available_years(readings: &[Reading], current_year: i32) -> Vec<String> {
    let mut years: BTreeSet<i32> = readings
        .iter()
        .filter_map(|r| r.year())
        .filter_map(|y| y.parse().ok())
        .collect();
    years.insert(current_year);

    years.into_iter().rev().map(|y| y.to_string()).collect()
}

/// Spanish month name for a two-digit month string.
pub fn month_name(month: &str) -> Option<&'static str> {
    if month.len() != 2 || !month.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match month.parse::<usize>() {
        Ok(m @ 1..=12) => Some(MONTH_NAMES[m - 1]),
        _ => None,
    }
}

/// `YYYY-MM-DD` to `DD/MM/YYYY`.
fn short_date(date: &str) -> String {
    let parts: Vec<&str> = date.splitn(3, '-').collect();
    match parts.as_slice() {
        [year, month, day] => format!("{}/{}/{}", day, month, year),
        _ => date.to_string(),
    }
}
