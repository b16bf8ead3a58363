use std::path::PathBuf;

use clap::Parser;

use crate::{BackendKind, Commands, Config};

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    version,
    about = "Diary entries and day journals on flat files or SQLite"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory holding all stored records
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend for entries, templates and contexts
    #[clap(short, long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the daybook application
    #[clap(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, mut config: Config) -> Config {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        config
    }
}
