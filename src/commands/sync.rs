use anyhow::Result;
use colored::Colorize;
use log::info;
use std::sync::Arc;

use crate::api::client::HttpTransport;
use crate::cli::commands::SyncCommands;
use crate::config::SyncConfig;
use crate::journal::{DailyFileSink, EventLog};
use crate::sync::{BatchDriver, RecordSource, RecordSynchronizer, SpreadsheetSource};

/// Read the spreadsheet and push every record, one at a time.
///
/// Per-record failures only show up in the journal; the command itself
/// succeeds once the end of the input is reached.
pub async fn sync_command(config: &SyncConfig, args: SyncCommands) -> Result<()> {
    info!("Executing sync command for {:?}", args.input);
    config.validate()?;

    let records = SpreadsheetSource::new(&args.input)
        .with_sheet(args.sheet)
        .read_records()?;

    let sink = DailyFileSink::new(&config.logs_dir, config.timezone()?)?;
    println!("Journal: {}", sink.current_path().display());
    let journal = Arc::new(EventLog::new(sink));

    let transport = Arc::new(HttpTransport::new(config.accept_invalid_certs)?);
    let mut synchronizer = RecordSynchronizer::from_config(config, transport, journal);

    let driver = BatchDriver::new();
    println!(
        "Synchronizing {} records (run {})",
        records.len(),
        driver.run_id()
    );
    let summary = driver.run(&records, &mut synchronizer).await;

    let line = summary.to_string();
    if summary.failed == 0 {
        println!("{} {}", "✓".green(), line);
    } else {
        println!("{} {}", "!".yellow(), line);
    }

    Ok(())
}
