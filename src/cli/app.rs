use super::commands::{AuthCommands, ConfigCommands, SyncCommands};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "unily-sync")]
#[command(about = "Synchronize spreadsheet user records into a Unily directory")]
pub struct Cli {
    /// Path to the config file (defaults to the per-user config location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push every record of a spreadsheet to the directory
    Sync(SyncCommands),
    /// Verify the configured client credentials
    Auth(AuthCommands),
    /// Show the effective configuration
    Config(ConfigCommands),
}
