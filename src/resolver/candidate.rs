//! Replacement candidates
//!
//! One variant per matching method, each carrying the same proposal data so
//! the newest-wins comparison is uniform across methods.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;

use crate::ocr::CorrectionMethod;

/// Replacement text proposed by one stored correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Append order of the originating correction
    pub sequence: i64,
    pub submitter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Exact(Proposal),
    Fuzzy(Proposal),
    Prefix(Proposal),
    CaseInsensitive(Proposal),
}

impl Candidate {
    /// Method specificity, lower is more specific
    pub fn priority(&self) -> u8 {
        match self {
            Self::Exact(_) => 1,
            Self::Fuzzy(_) => 2,
            Self::Prefix(_) => 3,
            Self::CaseInsensitive(_) => 4,
        }
    }

    pub fn method(&self) -> CorrectionMethod {
        match self {
            Self::Exact(_) => CorrectionMethod::Exact,
            Self::Fuzzy(_) => CorrectionMethod::Fuzzy,
            Self::Prefix(_) => CorrectionMethod::Prefix,
            Self::CaseInsensitive(_) => CorrectionMethod::CaseInsensitive,
        }
    }

    pub fn proposal(&self) -> &Proposal {
        match self {
            Self::Exact(p) | Self::Fuzzy(p) | Self::Prefix(p) | Self::CaseInsensitive(p) => p,
        }
    }

    pub fn text(&self) -> &str {
        &self.proposal().text
    }

    /// Ordering key: newest first, then most specific method, then latest append
    fn rank(&self) -> (Reverse<DateTime<Utc>>, u8, Reverse<i64>) {
        let p = self.proposal();
        (Reverse(p.timestamp), self.priority(), Reverse(p.sequence))
    }
}

/// Pick the winning candidate.
///
/// The timestamp always dominates: a newer, cruder match beats an older,
/// more specific one.
pub fn select_winner(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by_key(Candidate::rank)
}
