use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# glucolog configuration

# Directory holding the readings file (default: platform data dir + /glucolog)
# data_dir: ~/.local/share/glucolog

# Name of the slot holding the readings
storage_key: glucoseReadings

cache:
  # Origin the application assets are served from
  origin: http://localhost:5173
  # Bump on every asset change to invalidate the previous cache
  version: glucose-logger-v1.2
  # Port for `glucolog cache serve`
  port: 8090
  # Third-party origins fetched without CORS
  opaque_origins:
    - https://cdn.tailwindcss.com
"#;

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("storage_key: {}", config.storage_key.value);
                        println!("  source: {}", config.storage_key.source);
                        println!();

                        println!("cache.dir: {}", config.cache.dir.value.display());
                        println!("  source: {}", config.cache.dir.source);
                        println!("cache.origin: {}", config.cache.origin.value);
                        println!("  source: {}", config.cache.origin.source);
                        println!("cache.version: {}", config.cache.version);
                        println!("cache.port: {}", config.cache.port);
                        println!("cache.assets: {} entr(ies)", config.cache.assets.len());
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = cli_config_path.unwrap_or_else(Config::default_config_path);

                // Check if config already exists
                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'glucolog config show' to view current configuration.");
                    return Ok(());
                }

                // Create parent directory
                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
