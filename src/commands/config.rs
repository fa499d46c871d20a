use anyhow::Result;
use log::info;
use std::path::Path;

use crate::cli::commands::ConfigCommands;
use crate::config::SyncConfig;

/// Print the effective configuration, secret redacted
pub fn config_command(config: &SyncConfig, explicit: Option<&Path>, args: ConfigCommands) -> Result<()> {
    info!("Executing config command");

    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => SyncConfig::get_config_path()?,
    };

    if args.path {
        println!("{}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", config.redacted().to_toml_string()?);
    Ok(())
}
