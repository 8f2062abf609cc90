mod cache_cmd;
mod config_cmd;
mod export;
mod reading;

use clap::ValueEnum;

pub use cache_cmd::{CacheCommand, CacheSubcommand};
pub use config_cmd::ConfigCommand;
pub use export::ExportCommand;
pub use reading::{AddCommand, DeleteCommand, ListCommand};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
