//! Error types for the correction engine

use thiserror::Error;

use crate::ocr::OcrError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, CoreError>;

/// Engine error type
///
/// Lookup misses are not represented here: a token without a matching
/// correction or lexicon entry passes through unchanged. Invalid
/// submissions are not errors either; they are answered with a
/// [`RejectReason`](crate::corrections::RejectReason).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OCR source error: {0}")]
    Ocr(#[from] OcrError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the store could not be reached or written.
    ///
    /// Callers seeing this must keep the uncorrected document.
    pub fn is_persistence(&self) -> bool {
        matches!(self, CoreError::Persistence(_))
    }
}
