//! Correction index
//!
//! Lookup structures over the full correction history. The index is built
//! once and then updated on every append, so resolution never rescans the
//! log. Collisions keep the newest correction, ties going to the later
//! append, which makes the result independent of insertion order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::candidate::{select_winner, Candidate, Proposal};
use crate::config::ResolverConfig;
use crate::corrections::Correction;

#[derive(Debug, Clone)]
struct IndexedCorrection {
    corrected: String,
    timestamp: DateTime<Utc>,
    sequence: i64,
    submitter: String,
}

impl IndexedCorrection {
    fn from_correction(correction: &Correction) -> Self {
        Self {
            corrected: correction.corrected_text.clone(),
            timestamp: correction.timestamp,
            sequence: correction.sequence,
            submitter: correction.submitter.clone(),
        }
    }

    fn supersedes(&self, other: &Self) -> bool {
        (self.timestamp, self.sequence) >= (other.timestamp, other.sequence)
    }

    fn propose(&self, text: String) -> Proposal {
        Proposal {
            text,
            timestamp: self.timestamp,
            sequence: self.sequence,
            submitter: self.submitter.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct FuzzyEntry {
    correction: IndexedCorrection,
    /// The stored original had no trailing filler, so a token's filler is
    /// noise around it and is carried over to the replacement
    carries_filler: bool,
}

#[derive(Debug, Clone)]
struct PrefixEntry {
    original_clean: String,
    correction: IndexedCorrection,
}

#[derive(Debug, Clone)]
pub struct CorrectionIndex {
    filler_chars: Vec<char>,
    short_suffix_bound: usize,
    exact: HashMap<String, IndexedCorrection>,
    fuzzy: HashMap<String, FuzzyEntry>,
    prefixes: Vec<PrefixEntry>,
    /// Lowercased key → exact-map keys sharing it
    folded: HashMap<String, Vec<String>>,
    records: usize,
}

impl CorrectionIndex {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            filler_chars: config.filler_chars.clone(),
            short_suffix_bound: config.short_suffix_bound,
            exact: HashMap::new(),
            fuzzy: HashMap::new(),
            prefixes: Vec::new(),
            folded: HashMap::new(),
            records: 0,
        }
    }

    pub fn build<'c>(
        config: &ResolverConfig,
        corrections: impl IntoIterator<Item = &'c Correction>,
    ) -> Self {
        let mut index = Self::new(config);
        for correction in corrections {
            index.insert(correction);
        }
        index
    }

    /// Number of corrections indexed
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Add one correction to every lookup structure
    pub fn insert(&mut self, correction: &Correction) {
        let original = correction.original_text.as_str();
        let indexed = IndexedCorrection::from_correction(correction);
        self.records += 1;

        let replace_exact = self
            .exact
            .get(original)
            .map_or(true, |existing| indexed.supersedes(existing));
        if replace_exact {
            if !self.exact.contains_key(original) {
                self.folded
                    .entry(original.to_lowercase())
                    .or_default()
                    .push(original.to_string());
            }
            self.exact.insert(original.to_string(), indexed.clone());
        }

        let original_clean = self.strip_filler(original);
        if original_clean.is_empty() {
            return;
        }
        let original_clean = original_clean.to_string();

        let replace_fuzzy = self
            .fuzzy
            .get(&original_clean)
            .map_or(true, |existing| indexed.supersedes(&existing.correction));
        if replace_fuzzy {
            self.fuzzy.insert(
                original_clean.clone(),
                FuzzyEntry {
                    correction: indexed.clone(),
                    carries_filler: original_clean.len() == original.len(),
                },
            );
        }

        self.prefixes.push(PrefixEntry {
            original_clean,
            correction: indexed,
        });
    }

    /// Strip trailing OCR filler characters
    pub fn strip_filler<'s>(&self, value: &'s str) -> &'s str {
        value.trim_end_matches(|c| self.filler_chars.contains(&c))
    }

    /// Every candidate replacement for a token, in no particular order
    pub fn candidates(&self, value: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let value_clean = self.strip_filler(value);

        if let Some(exact) = self.exact.get(value) {
            candidates.push(Candidate::Exact(exact.propose(exact.corrected.clone())));
        }

        if !value_clean.is_empty() {
            if let Some(fuzzy) = self.fuzzy.get(value_clean) {
                let mut text = fuzzy.correction.corrected.clone();
                if fuzzy.carries_filler {
                    text.push_str(&value[value_clean.len()..]);
                }
                candidates.push(Candidate::Fuzzy(fuzzy.correction.propose(text)));
            }

            for prefix in &self.prefixes {
                if !value_clean.starts_with(prefix.original_clean.as_str()) {
                    continue;
                }
                let leftover = &value[prefix.original_clean.len()..];
                if leftover.chars().count() >= self.short_suffix_bound {
                    continue;
                }
                let text = format!("{}{}", prefix.correction.corrected, leftover);
                candidates.push(Candidate::Prefix(prefix.correction.propose(text)));
            }
        }

        if let Some(keys) = self.folded.get(&value.to_lowercase()) {
            for key in keys.iter().filter(|k| k.as_str() != value) {
                if let Some(entry) = self.exact.get(key) {
                    candidates.push(Candidate::CaseInsensitive(entry.propose(entry.corrected.clone())));
                }
            }
        }

        candidates
    }

    /// Best replacement for a token, `None` when nothing would change it
    pub fn resolve(&self, value: &str) -> Option<Candidate> {
        if value.trim().is_empty() {
            return None;
        }
        select_winner(self.candidates(value)).filter(|winner| winner.text() != value)
    }
}
