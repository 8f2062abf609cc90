use chrono::{Datelike, Local};
use clap::Args;
use glucolog_core::{available_years, export_month, ExportOutcome, Reading};
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportCommand {
    /// Year (YYYY), defaults to the current year
    #[arg(long, short)]
    pub year: Option<String>,

    /// Month (MM, 01-12), defaults to the current month
    #[arg(long, short)]
    pub month: Option<String>,

    /// Directory to write the report into
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
}

impl ExportCommand {
    pub fn run(&self, readings: &[Reading]) -> Result<(), Box<dyn std::error::Error>> {
        let today = Local::now().date_naive();
        let year = self
            .year
            .clone()
            .unwrap_or_else(|| today.year().to_string());
        let month = self
            .month
            .as_ref()
            .map(|m| format!("{:0>2}", m))
            .unwrap_or_else(|| format!("{:02}", today.month()));

        match export_month(readings, &year, &month)? {
            ExportOutcome::Report(report) => {
                let path = report.write_to(&self.output)?;
                println!("Informe guardado: {}", path.display());
                println!("Total de mediciones: {}", report.count);
            }
            ExportOutcome::Empty { message } => {
                println!("{}", message);
                let years = available_years(readings, today.year());
                println!("Años con mediciones: {}", years.join(", "));
            }
        }

        Ok(())
    }
}
