use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct SyncCommands {
    /// Spreadsheet with email, year, quarter and persona columns (.csv, .xlsx, .xls, .ods)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Sheet to read (defaults to the first one)
    #[arg(short, long)]
    pub sheet: Option<String>,
}

#[derive(Args)]
pub struct AuthCommands {}

#[derive(Args)]
pub struct ConfigCommands {
    /// Only print where the config file is read from
    #[arg(long)]
    pub path: bool,
}
