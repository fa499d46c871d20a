//! Record synchronization: input records, property merge, per-record
//! pipeline and the sequential batch driver.

pub mod batch;
pub mod input;
pub mod record;
pub mod synchronizer;

pub use batch::{BatchDriver, BatchSummary};
pub use input::{RecordSource, SpreadsheetSource};
pub use record::{InputRecord, merge_properties};
pub use synchronizer::{RecordHandler, RecordOutcome, RecordSynchronizer, SUCCESS_MESSAGE};
