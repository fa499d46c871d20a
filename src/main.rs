use anyhow::Result;
use clap::Parser;
use log::info;

use unily_sync::cli::{Cli, Commands};
use unily_sync::commands::{auth_command, config_command, sync_command};
use unily_sync::config::SyncConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("unily-sync.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let cli = Cli::parse();
    info!("Starting unily-sync");

    let config = SyncConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync(args) => sync_command(&config, args).await,
        Commands::Auth(_) => auth_command(&config).await,
        Commands::Config(args) => config_command(&config, cli.config.as_deref(), args),
    }
}
