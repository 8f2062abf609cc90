use chrono::Local;
use clap::Args;
use glucolog_core::{Reading, ReadingCollection, ReadingInput, SlotStore};

use super::OutputFormat;

#[derive(Args)]
pub struct AddCommand {
    /// Glucose level in mg/dL
    pub level: String,

    /// Date (YYYY-MM-DD), defaults to today
    #[arg(long, short)]
    pub date: Option<String>,

    /// Time (HH:MM, 24h), defaults to now
    #[arg(long, short)]
    pub time: Option<String>,
}

impl AddCommand {
    pub fn run<S: SlotStore>(
        &self,
        readings: &mut ReadingCollection<S>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let now = Local::now();
        let input = ReadingInput::new(
            self.level.clone(),
            self.date
                .clone()
                .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
            self.time
                .clone()
                .unwrap_or_else(|| now.format("%H:%M").to_string()),
        );

        let reading = readings.add(&input)?;

        if let Some(notification) = readings.notifier().last() {
            println!("{}", notification.message);
        }
        println!();
        print_reading(&reading);

        Ok(())
    }
}

#[derive(Args)]
pub struct ListCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ListCommand {
    pub fn run<S: SlotStore>(
        &self,
        readings: &ReadingCollection<S>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let view = readings.sorted_view();

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            OutputFormat::Text => {
                if view.is_empty() {
                    println!("No hay mediciones registradas aún.");
                    return Ok(());
                }

                println!("Historial de Mediciones");
                println!("{}", "=".repeat(40));
                for reading in &view {
                    print_reading(reading);
                    println!();
                }
                println!("Total: {} medición(es)", view.len());
            }
        }

        Ok(())
    }
}

#[derive(Args)]
pub struct DeleteCommand {
    /// Reading ID
    pub id: String,
}

impl DeleteCommand {
    pub fn run<S: SlotStore>(
        &self,
        readings: &mut ReadingCollection<S>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !readings.delete(&self.id)? {
            tracing::debug!("No reading with id {}", self.id);
        }

        if let Some(notification) = readings.notifier().last() {
            println!("{}", notification.message);
        }

        Ok(())
    }
}

fn print_reading(reading: &Reading) {
    let status = reading.status();
    println!(
        "  {} mg/dL  [{}] ({})",
        reading.glucose_level,
        status.label(),
        status.severity()
    );
    println!("  {} - {}", reading.long_date(), reading.time);
    println!("  ID: {}", reading.id);
}
