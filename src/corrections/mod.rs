//! Correction Store
//!
//! Append-only log of reviewer corrections. Records are never updated or
//! deleted through normal flow; no-op corrections are rejected before they
//! reach the log.

mod store;
mod types;

pub use store::{append, CorrectionRepository};
pub use types::{
    format_timestamp, Correction, CorrectionStatistics, DataIntegrityWarning, NewCorrection,
    PatternCount, RecordOutcome, RejectReason,
};
