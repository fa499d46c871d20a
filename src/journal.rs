//! Append-only audit journal
//!
//! Every outcome of the synchronization run is written as one line to a
//! per-day file and mirrored on the console. Diagnostics for developers go
//! through the `log` facade separately.

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use colored::Colorize;
use log::{error, info, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Status code written on every `ErrorType:` line, whatever the HTTP status
pub const ERROR_STATUS_CODE: u16 = 500;

/// Destination for journal lines
pub trait LogSink: Send + Sync {
    fn append(&self, line: &str) -> Result<()>;
}

/// Writes `log_<YYYYMMDD>.txt` under a directory, dated in a fixed time zone
pub struct DailyFileSink {
    dir: PathBuf,
    timezone: Tz,
}

impl DailyFileSink {
    pub fn new(dir: impl Into<PathBuf>, timezone: Tz) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create logs directory: {:?}", dir))?;
            info!("Created logs directory: {:?}", dir);
        }
        Ok(Self { dir, timezone })
    }

    /// File the next line will land in
    pub fn current_path(&self) -> PathBuf {
        let today = Utc::now().with_timezone(&self.timezone);
        self.dir.join(file_name_for(&today.format("%Y%m%d").to_string()))
    }
}

fn file_name_for(date_stamp: &str) -> String {
    format!("log_{}.txt", date_stamp)
}

impl LogSink for DailyFileSink {
    fn append(&self, line: &str) -> Result<()> {
        let path = self.current_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open journal file: {:?}", path))?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to write journal file: {:?}", path))?;
        Ok(())
    }
}

/// In-memory sink, handy for tests and dry inspection
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn append(&self, line: &str) -> Result<()> {
        self.lines
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory sink lock poisoned"))?
            .push(line.to_string());
        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for std::sync::Arc<S> {
    fn append(&self, line: &str) -> Result<()> {
        (**self).append(line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Success,
    Notice,
    Failure,
}

/// Journal front end: sink + console mirror + diagnostic log
pub struct EventLog {
    sink: Box<dyn LogSink>,
    console: bool,
}

impl EventLog {
    pub fn new(sink: impl LogSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            console: true,
        }
    }

    /// Disable the console mirror (tests, quiet runs)
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn success(&self, line: &str) {
        self.record(EventKind::Success, line);
    }

    pub fn notice(&self, line: &str) {
        self.record(EventKind::Notice, line);
    }

    pub fn failure(&self, line: &str) {
        self.record(EventKind::Failure, line);
    }

    pub fn record(&self, kind: EventKind, line: &str) {
        match kind {
            EventKind::Success => info!("{}", line),
            EventKind::Notice => warn!("{}", line),
            EventKind::Failure => error!("{}", line),
        }

        if self.console {
            match kind {
                EventKind::Success => println!("{}", line.green()),
                EventKind::Notice => println!("{}", line.yellow()),
                EventKind::Failure => eprintln!("{}", line.red()),
            }
        }

        if let Err(e) = self.sink.append(line) {
            warn!("Journal write failed: {:#}", e);
        }
    }
}
