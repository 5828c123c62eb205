//! OCR Corrections
//!
//! Correction resolution and lexicon learning for human-reviewed OCR output.
//! Reviewer corrections made on one document propagate to every other
//! document that shares the misrecognized token, and recurring corrections
//! are promoted into a scoped lexicon applied to fresh OCR output.
//!
//! # Modules
//!
//! - `corrections`: Append-only correction log
//! - `lexicon`: Frequency counting, promotion and lexicon application
//! - `resolver`: Multi-strategy matching against correction history
//! - `service`: The exposed interface tying the stages together
//! - `ocr`: Word-stream types and the recognizer/classifier traits

pub mod config;
pub mod corrections;
pub mod db;
pub mod error;
pub mod lexicon;
pub mod ocr;
pub mod resolver;
pub mod service;

pub use config::Config;
pub use error::{CoreError, Result};
pub use lexicon::Scope;
pub use service::{
    CorrectedDocument, CorrectionService, CorrectionSubmission, DocumentContext, SubmissionResponse,
};
