use log::info;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::record::InputRecord;
use super::synchronizer::RecordHandler;

/// Totals for one pass over the input
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} records: {} updated, {} failed ({:.1}s)",
            self.total,
            self.updated,
            self.failed,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Feeds records through a handler strictly one after another
pub struct BatchDriver {
    run_id: Uuid,
}

impl BatchDriver {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Each record is fully handled before the next one starts. Failures are
    /// counted, never propagated.
    pub async fn run<H>(&self, records: &[InputRecord], handler: &mut H) -> BatchSummary
    where
        H: RecordHandler + ?Sized,
    {
        let started = Instant::now();
        info!("Batch {} starting with {} records", self.run_id, records.len());

        let mut updated = 0;
        let mut failed = 0;

        for (index, record) in records.iter().enumerate() {
            info!(
                "Batch {}: record {}/{} ({})",
                self.run_id,
                index + 1,
                records.len(),
                record.email
            );

            if handler.handle(record).await.is_success() {
                updated += 1;
            } else {
                failed += 1;
            }
        }

        let summary = BatchSummary {
            run_id: self.run_id,
            total: records.len(),
            updated,
            failed,
            elapsed: started.elapsed(),
        };
        info!("Batch {} finished: {}", self.run_id, summary);
        summary
    }
}

impl Default for BatchDriver {
    fn default() -> Self {
        Self::new()
    }
}
