//! Multi-strategy correction resolver
//!
//! Resolves each word of a document against the whole correction history
//! (the document's own corrections and every other document's). Four
//! matching methods produce candidates; the newest correction wins
//! regardless of method, with method specificity only breaking timestamp
//! ties.

mod candidate;
mod index;

pub use candidate::{select_winner, Candidate, Proposal};
pub use index::CorrectionIndex;

use crate::ocr::{AppliedCorrection, OcrDocument};

/// Resolve every word of a document in place.
///
/// A word with no winning candidate is left as is; one word never affects
/// another.
pub fn resolve_document(index: &CorrectionIndex, document: &mut OcrDocument) -> Vec<AppliedCorrection> {
    let mut applied = Vec::new();
    if index.is_empty() {
        return applied;
    }

    for word in document.words_mut() {
        let Some(winner) = index.resolve(&word.text) else {
            continue;
        };
        let method = winner.method();
        let Proposal {
            text,
            timestamp,
            submitter,
            ..
        } = winner.proposal().clone();

        tracing::debug!(
            "Resolved '{}' -> '{}' ({:?}, {})",
            word.text,
            text,
            method,
            timestamp
        );

        applied.push(AppliedCorrection {
            original: word.text.clone(),
            corrected: text.clone(),
            method,
            applied_at: timestamp,
        });
        word.apply_correction(text, method, timestamp, Some(submitter));
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::corrections::Correction;
    use crate::ocr::{CorrectionMethod, OcrRect, OcrWord};
    use chrono::{TimeZone, Utc};

    fn correction(document_id: &str, original: &str, corrected: &str, secs: i64, sequence: i64) -> Correction {
        Correction {
            id: format!("c-{}", sequence),
            sequence,
            document_id: Some(document_id.to_string()),
            position_ref: "p1:w3".to_string(),
            original_text: original.to_string(),
            corrected_text: corrected.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            submitter: "reviewer".to_string(),
            geometry: None,
        }
    }

    fn document(tokens: &[&str]) -> OcrDocument {
        let rect = OcrRect {
            x: 0.1,
            y: 0.1,
            width: 0.1,
            height: 0.02,
        };
        OcrDocument::from_words(tokens.iter().map(|t| OcrWord::new(*t, 0.8, rect)).collect())
    }

    #[test]
    fn test_annotates_resolved_words() {
        let index = CorrectionIndex::build(
            &ResolverConfig::default(),
            &[correction("doc-a", "INV-001", "INV-0001", 100, 1)],
        );
        let mut doc = document(&["Invoice", "INV-001", "  "]);

        let applied = resolve_document(&index, &mut doc);

        assert_eq!(applied.len(), 1);
        let words: Vec<&OcrWord> = doc.words().collect();
        assert_eq!(words[0].text, "Invoice");
        assert!(!words[0].corrected);

        let word = words[1];
        assert_eq!(word.text, "INV-0001");
        assert!(word.corrected);
        assert!(!word.auto_corrected);
        assert_eq!(word.original_value.as_deref(), Some("INV-001"));
        assert_eq!(word.correction_method, Some(CorrectionMethod::Exact));
        assert_eq!(word.corrected_at, Some(Utc.timestamp_opt(100, 0).unwrap()));
        assert_eq!(word.corrected_by.as_deref(), Some("reviewer"));

        assert_eq!(words[2].text, "  ");
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let index = CorrectionIndex::build(
            &ResolverConfig::default(),
            &[
                correction("doc-a", "X", "Y", 1, 1),
                correction("doc-b", "X", "Z", 2, 2),
                correction("doc-b", "TOTAL", "Total", 3, 3),
            ],
        );
        let input = document(&["X", "TOTAL<<", "total", "other"]);

        let mut first = input.clone();
        let mut second = input.clone();
        let first_applied = resolve_document(&index, &mut first);
        let second_applied = resolve_document(&index, &mut second);

        assert_eq!(first, second);
        assert_eq!(first_applied, second_applied);
        assert_eq!(first.full_text(), "Z Total<< Total other");
    }

    #[test]
    fn test_empty_index_leaves_document_alone() {
        let index = CorrectionIndex::new(&ResolverConfig::default());
        let mut doc = document(&["X"]);
        assert!(resolve_document(&index, &mut doc).is_empty());
        assert_eq!(doc, document(&["X"]));
    }
}
