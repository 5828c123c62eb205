//! Correction data types

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::ocr::OcrRect;

/// A stored reviewer correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: String,
    /// Append order, breaks ties between equal timestamps
    pub sequence: i64,
    #[serde(rename = "documentId")]
    pub document_id: Option<String>,
    /// Opaque token locator from the review UI
    #[serde(rename = "positionRef")]
    pub position_ref: String,
    #[serde(rename = "originalText")]
    pub original_text: String,
    #[serde(rename = "correctedText")]
    pub corrected_text: String,
    pub timestamp: DateTime<Utc>,
    pub submitter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<OcrRect>,
}

/// A correction as submitted, before it is appended
#[derive(Debug, Clone, Deserialize)]
pub struct NewCorrection {
    #[serde(rename = "documentId")]
    pub document_id: Option<String>,
    #[serde(rename = "positionRef", default)]
    pub position_ref: String,
    #[serde(rename = "originalText")]
    pub original_text: String,
    #[serde(rename = "correctedText")]
    pub corrected_text: String,
    #[serde(default)]
    pub submitter: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub geometry: Option<OcrRect>,
}

impl NewCorrection {
    pub fn new(
        document_id: Option<&str>,
        position_ref: &str,
        original_text: &str,
        corrected_text: &str,
        submitter: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            document_id: document_id.map(str::to_string),
            position_ref: position_ref.to_string(),
            original_text: original_text.to_string(),
            corrected_text: corrected_text.to_string(),
            submitter: submitter.to_string(),
            timestamp,
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: OcrRect) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Check the submission before anything is written
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.original_text.trim().is_empty() {
            return Err(RejectReason::EmptyOriginal);
        }
        if self.corrected_text.trim().is_empty() {
            return Err(RejectReason::EmptyCorrected);
        }
        if self.original_text == self.corrected_text {
            return Err(RejectReason::NoOp);
        }
        if let Some(geometry) = &self.geometry {
            if !geometry.is_normalized() {
                return Err(RejectReason::InvalidGeometry);
            }
        }
        Ok(())
    }

    /// Timestamp at the precision the store keeps
    pub(crate) fn stored_timestamp(&self) -> DateTime<Utc> {
        self.timestamp.trunc_subsecs(6)
    }
}

/// Why a submission was not recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("corrected text is identical to the original")]
    NoOp,
    #[error("original text is empty")]
    EmptyOriginal,
    #[error("corrected text is empty")]
    EmptyCorrected,
    #[error("geometry is outside the normalized page")]
    InvalidGeometry,
}

/// Result of an append attempt
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(Correction),
    Rejected(RejectReason),
}

/// A stored row that cannot be used for matching
#[derive(Debug, Clone, Error)]
pub enum DataIntegrityWarning {
    #[error("correction {id} is missing {field}")]
    MissingField { id: String, field: &'static str },

    #[error("correction {id} has invalid timestamp {value:?}")]
    InvalidTimestamp { id: String, value: String },

    #[error("correction {id} has unreadable geometry: {reason}")]
    InvalidGeometry { id: String, reason: String },
}

/// Aggregate view of the correction log
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionStatistics {
    #[serde(rename = "totalCorrections")]
    pub total_corrections: u64,
    #[serde(rename = "correctionsBySubmitter")]
    pub corrections_by_submitter: BTreeMap<String, u64>,
    /// Recurring pairs, most frequent first
    #[serde(rename = "commonPatterns")]
    pub common_patterns: Vec<PatternCount>,
    #[serde(rename = "lastCorrectionAt")]
    pub last_correction_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCount {
    #[serde(rename = "originalText")]
    pub original_text: String,
    #[serde(rename = "correctedText")]
    pub corrected_text: String,
    pub count: u64,
}

/// Fixed-width UTC form, so text order equals time order
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
