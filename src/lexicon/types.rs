//! Lexicon data types

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

const GLOBAL_SCOPE: &str = "global";

/// Visibility boundary for lexicon entries and thresholds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    Global,
    DocumentType(String),
}

impl Scope {
    pub fn for_type(document_type: impl Into<String>) -> Self {
        Self::from(document_type.into())
    }

    /// Scope for an optional classifier result; unknown types are global
    pub fn from_document_type(document_type: Option<&str>) -> Self {
        match document_type {
            Some(t) => Self::from(t.to_string()),
            None => Self::Global,
        }
    }

    pub fn document_type(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::DocumentType(t) => Some(t),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => GLOBAL_SCOPE,
            Self::DocumentType(t) => t,
        }
    }
}

impl From<String> for Scope {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == GLOBAL_SCOPE {
            Self::Global
        } else {
            Self::DocumentType(trimmed.to_string())
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexicon key form: trimmed, inner whitespace collapsed to single spaces
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A persisted lexicon row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexiconEntry {
    pub id: String,
    pub key: String,
    pub scope: Scope,
    #[serde(rename = "correctedText")]
    pub corrected_text: String,
    /// Observation count when the entry was last written
    pub frequency: u64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Result of evaluating a pair for promotion
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
    BelowThreshold { frequency: u64, threshold: u32 },
    Inserted(LexiconEntry),
    Updated { entry: LexiconEntry, previous: String },
    Unchanged(LexiconEntry),
}

impl PromotionOutcome {
    /// Whether the lexicon was written
    pub fn changed(&self) -> bool {
        matches!(self, Self::Inserted(_) | Self::Updated { .. })
    }

    pub fn entry(&self) -> Option<&LexiconEntry> {
        match self {
            Self::BelowThreshold { .. } => None,
            Self::Inserted(entry) | Self::Unchanged(entry) => Some(entry),
            Self::Updated { entry, .. } => Some(entry),
        }
    }
}

/// Read-only merged view of the lexicon for one scope
///
/// Document-type entries take precedence over global ones on key collision.
#[derive(Debug, Default)]
pub struct LexiconSnapshot {
    entries: BTreeMap<String, String>,
    pattern: OnceLock<Option<Regex>>,
}

impl LexiconSnapshot {
    pub fn new(
        global: impl IntoIterator<Item = (String, String)>,
        typed: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut entries: BTreeMap<String, String> = global.into_iter().collect();
        entries.extend(typed);
        Self {
            entries,
            pattern: OnceLock::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain original → corrected mapping
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }

    /// Case-insensitive alternation of every key, longest first.
    ///
    /// Inner whitespace in a key matches any whitespace run. Each key is
    /// anchored so that it is never directly preceded or followed by a word
    /// character; a key that fails its anchors lets a shorter key at the
    /// same position match instead.
    pub(crate) fn pattern(&self) -> Option<&Regex> {
        self.pattern
            .get_or_init(|| {
                if self.entries.is_empty() {
                    return None;
                }
                let mut keys: Vec<&String> = self.entries.keys().collect();
                keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

                let alternation = keys
                    .iter()
                    .filter_map(|key| {
                        let key = key.trim();
                        let first = key.chars().next()?;
                        let last = key.chars().next_back()?;
                        let body = key
                            .split_whitespace()
                            .map(regex::escape)
                            .collect::<Vec<_>>()
                            .join(r"\s+");
                        Some(format!("{}{}{}", edge_anchor(first), body, edge_anchor(last)))
                    })
                    .collect::<Vec<_>>()
                    .join("|");
                if alternation.is_empty() {
                    return None;
                }

                match Regex::new(&format!("(?i)(?:{})", alternation)) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        tracing::warn!("Lexicon pattern could not be compiled: {}", e);
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// `\b` next to a word character, `\B` next to anything else: either way the
/// neighbouring text character must not be a word character.
fn edge_anchor(edge: char) -> &'static str {
    if edge.is_alphanumeric() || edge == '_' {
        r"\b"
    } else {
        r"\B"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing() {
        assert_eq!(Scope::for_type("invoice"), Scope::DocumentType("invoice".to_string()));
        assert_eq!(Scope::for_type("global"), Scope::Global);
        assert_eq!(Scope::for_type("  "), Scope::Global);
        assert_eq!(Scope::from_document_type(None), Scope::Global);
        assert_eq!(Scope::for_type("receipt").as_str(), "receipt");

        let json = serde_json::to_string(&Scope::for_type("invoice")).unwrap();
        assert_eq!(json, "\"invoice\"");
        let back: Scope = serde_json::from_str("\"global\"").unwrap();
        assert_eq!(back, Scope::Global);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  ACME   Corp \t Ltd "), "ACME Corp Ltd");
        assert_eq!(normalize_key("X"), "X");
    }

    #[test]
    fn test_typed_entries_take_precedence() {
        let snapshot = LexiconSnapshot::new(
            vec![
                ("T0TAL".to_string(), "TOTAL".to_string()),
                ("0RDER".to_string(), "ORDER".to_string()),
            ],
            vec![("T0TAL".to_string(), "TOTAL DUE".to_string())],
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("T0TAL"), Some("TOTAL DUE"));
        assert_eq!(snapshot.get("0RDER"), Some("ORDER"));
    }

    #[test]
    fn test_pattern_prefers_longer_keys() {
        let snapshot = LexiconSnapshot::new(
            vec![
                ("INV".to_string(), "INVOICE".to_string()),
                ("INV NO".to_string(), "INVOICE NO".to_string()),
            ],
            Vec::new(),
        );

        let regex = snapshot.pattern().unwrap();
        let found = regex.find("see inv   no 4").unwrap();
        assert_eq!(found.as_str(), "inv   no");

        // The longer key fails its trailing anchor, the shorter one matches
        let found = regex.find("INV NOX").unwrap();
        assert_eq!(found.as_str(), "INV");
        assert!(regex.find("INVNO").is_none());
        assert!(LexiconSnapshot::default().pattern().is_none());
    }
}
