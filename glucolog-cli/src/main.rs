use clap::{Parser, Subcommand};
use glucolog_core::{FileSlotStore, ReadingCollection};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod proxy;

use commands::{
    AddCommand, CacheCommand, CacheSubcommand, ConfigCommand, DeleteCommand, ExportCommand,
    ListCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "glucolog")]
#[command(version)]
#[command(about = "A glucose reading logger", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a glucose reading
    Add(AddCommand),

    /// Show the reading history, most recent first
    List(ListCommand),

    /// Delete a reading by ID
    Delete(DeleteCommand),

    /// Export one month of readings as a text report
    Export(ExportCommand),

    /// Manage the offline asset cache
    Cache(CacheCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(&cli.command);

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    // Load configuration
    let config = Config::load(cli.config)?;

    execute_command(&cli.command, &config, cli_config_path)
}

/// Logs go to stderr. `RUST_LOG` overrides the default filter.
fn init_tracing(command: &Option<Commands>) {
    let default_filter = if is_serve_command(command) {
        "glucolog=info,glucolog_core=info,tower_http=info"
    } else {
        "glucolog=warn,glucolog_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_readings(config: &Config) -> ReadingCollection<FileSlotStore> {
    ReadingCollection::load(
        FileSlotStore::new(config.data_dir.value.clone()),
        config.storage_key.value.clone(),
    )
}

fn execute_command(
    command: &Option<Commands>,
    config: &Config,
    cli_config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Add(cmd)) => {
            let mut readings = open_readings(config);
            cmd.run(&mut readings)?;
        }
        Some(Commands::List(cmd)) => {
            let readings = open_readings(config);
            cmd.run(&readings)?;
        }
        Some(Commands::Delete(cmd)) => {
            let mut readings = open_readings(config);
            cmd.run(&mut readings)?;
        }
        Some(Commands::Export(cmd)) => {
            let readings = open_readings(config);
            cmd.run(readings.readings())?;
        }
        Some(Commands::Cache(cmd)) => {
            cmd.run(config)?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(config, cli_config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn is_serve_command(cmd: &Option<Commands>) -> bool {
    matches!(
        cmd,
        Some(Commands::Cache(c)) if matches!(c.command, CacheSubcommand::Serve { .. })
    )
}
