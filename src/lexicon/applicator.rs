//! Lexicon application
//!
//! Applies a lexicon snapshot to fresh OCR output or free text before any
//! history-based resolution. Matching per token is single-shot: exact, then
//! case-insensitive, then whitespace-normalized; the first hit wins.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{normalize_key, LexiconSnapshot};
use crate::ocr::{AppliedCorrection, CorrectionMethod, OcrDocument};

pub struct LexiconApplicator<'a> {
    snapshot: &'a LexiconSnapshot,
}

/// Free text after lexicon application
#[derive(Debug, Clone, Serialize)]
pub struct TextCorrection {
    pub text: String,
    pub applied: Vec<AppliedCorrection>,
}

/// A lexicon entry that appears in a text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub original: String,
    pub corrected: String,
}

impl<'a> LexiconApplicator<'a> {
    pub fn new(snapshot: &'a LexiconSnapshot) -> Self {
        Self { snapshot }
    }

    /// Find the lexicon replacement for a single token.
    ///
    /// Returns `None` on a miss and when the replacement equals the token.
    pub fn find_correction(&self, token: &str) -> Option<(String, CorrectionMethod)> {
        let input = token.trim();
        if input.is_empty() {
            return None;
        }

        let found = if let Some(corrected) = self.snapshot.get(input) {
            Some((corrected.to_string(), CorrectionMethod::LexiconExact))
        } else {
            let folded = input.to_lowercase();
            self.snapshot
                .iter()
                .find(|(key, _)| key.to_lowercase() == folded)
                .map(|(_, corrected)| {
                    (preserve_case(input, corrected), CorrectionMethod::LexiconCaseInsensitive)
                })
                .or_else(|| {
                    self.snapshot
                        .get(&normalize_key(input))
                        .map(|corrected| (corrected.to_string(), CorrectionMethod::LexiconNormalized))
                })
        };

        found.filter(|(corrected, _)| corrected != input)
    }

    /// Correct every word of a document in place
    pub fn apply_to_document(
        &self,
        document: &mut OcrDocument,
        at: DateTime<Utc>,
    ) -> Vec<AppliedCorrection> {
        let mut applied = Vec::new();
        if self.snapshot.is_empty() {
            return applied;
        }

        for word in document.words_mut() {
            let Some((corrected, method)) = self.find_correction(&word.text) else {
                continue;
            };
            let corrected = repad(&word.text, &corrected);
            tracing::debug!("Applying lexicon correction: '{}' -> '{}'", word.text, corrected);

            applied.push(AppliedCorrection {
                original: word.text.clone(),
                corrected: corrected.clone(),
                method,
                applied_at: at,
            });
            word.apply_correction(corrected, method, at, None);
        }

        applied
    }

    /// Correct free text, matching whole words only.
    ///
    /// A match counts only when it is not directly preceded or followed by a
    /// letter, digit or underscore.
    pub fn apply_to_text(&self, text: &str, at: DateTime<Utc>) -> TextCorrection {
        let Some(pattern) = self.snapshot.pattern() else {
            return TextCorrection {
                text: text.to_string(),
                applied: Vec::new(),
            };
        };

        let mut output = String::with_capacity(text.len());
        let mut applied = Vec::new();
        let mut last = 0;

        for found in pattern.find_iter(text) {
            let Some((corrected, method)) = self.find_correction(found.as_str()) else {
                continue;
            };

            output.push_str(&text[last..found.start()]);
            output.push_str(&corrected);
            last = found.end();

            applied.push(AppliedCorrection {
                original: found.as_str().to_string(),
                corrected,
                method,
                applied_at: at,
            });
        }
        output.push_str(&text[last..]);

        TextCorrection {
            text: output,
            applied,
        }
    }

    /// Entries whose key occurs anywhere in the text, ignoring case
    pub fn suggestions(&self, text: &str) -> Vec<Suggestion> {
        let folded = text.to_lowercase();
        self.snapshot
            .iter()
            .filter(|(key, _)| folded.contains(&key.to_lowercase()))
            .map(|(key, corrected)| Suggestion {
                original: key.to_string(),
                corrected: corrected.to_string(),
            })
            .collect()
    }
}

/// Surround the replacement with the token's own leading and trailing whitespace
fn repad(token: &str, replacement: &str) -> String {
    let start = token.len() - token.trim_start().len();
    let end = token.trim_end().len().max(start);
    format!("{}{}{}", &token[..start], replacement, &token[end..])
}

/// Re-derive the replacement's case from the input's case pattern
pub fn preserve_case(original: &str, corrected: &str) -> String {
    if original.is_empty() || corrected.is_empty() {
        return corrected.to_string();
    }

    if is_upper(original) {
        return corrected.to_uppercase();
    }

    let mut chars = original.chars();
    let first_upper = chars.next().is_some_and(char::is_uppercase);
    let rest: String = chars.collect();
    if first_upper && !rest.is_empty() && is_lower(&rest) {
        let mut out = corrected.chars();
        return match out.next() {
            Some(first) => {
                let tail = out.as_str().to_lowercase();
                first.to_uppercase().chain(tail.chars()).collect()
            }
            None => String::new(),
        };
    }

    if is_lower(original) {
        return corrected.to_lowercase();
    }

    corrected.to_string()
}

fn is_cased(c: char) -> bool {
    c.is_uppercase() || c.is_lowercase()
}

fn is_upper(s: &str) -> bool {
    s.chars().any(is_cased) && !s.chars().any(char::is_lowercase)
}

fn is_lower(s: &str) -> bool {
    s.chars().any(is_cased) && !s.chars().any(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrRect, OcrWord};

    fn snapshot(pairs: &[(&str, &str)]) -> LexiconSnapshot {
        LexiconSnapshot::new(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            Vec::new(),
        )
    }

    fn document(words: &[&str]) -> OcrDocument {
        let rect = OcrRect { x: 0.1, y: 0.1, width: 0.1, height: 0.02 };
        OcrDocument::from_words(words.iter().map(|w| OcrWord::new(*w, 0.8, rect)).collect())
    }

    #[test]
    fn test_preserve_case() {
        assert_eq!(preserve_case("HELLO", "world"), "WORLD");
        assert_eq!(preserve_case("Hello", "world"), "World");
        assert_eq!(preserve_case("hello", "WORLD"), "world");
        assert_eq!(preserve_case("hElLo", "World"), "World");
        assert_eq!(preserve_case("INV-001", "inv-0001"), "INV-0001");
        assert_eq!(preserve_case("12345", "abc"), "abc");
    }

    #[test]
    fn test_matching_order() {
        let snap = snapshot(&[("hello", "world"), ("ACME Corp", "ACME Corporation")]);
        let applicator = LexiconApplicator::new(&snap);

        assert_eq!(
            applicator.find_correction("hello"),
            Some(("world".to_string(), CorrectionMethod::LexiconExact))
        );
        assert_eq!(
            applicator.find_correction("HELLO"),
            Some(("WORLD".to_string(), CorrectionMethod::LexiconCaseInsensitive))
        );
        assert_eq!(
            applicator.find_correction("Hello"),
            Some(("World".to_string(), CorrectionMethod::LexiconCaseInsensitive))
        );
        assert_eq!(
            applicator.find_correction("ACME   Corp"),
            Some(("ACME Corporation".to_string(), CorrectionMethod::LexiconNormalized))
        );
        assert_eq!(applicator.find_correction("goodbye"), None);
        assert_eq!(applicator.find_correction("   "), None);
    }

    #[test]
    fn test_apply_to_document_marks_words() {
        let snap = snapshot(&[("T0TAL", "TOTAL")]);
        let applicator = LexiconApplicator::new(&snap);
        let mut doc = document(&["T0TAL", "42.00"]);
        let now = Utc::now();

        let applied = applicator.apply_to_document(&mut doc, now);

        assert_eq!(applied.len(), 1);
        let word = doc.words().next().unwrap();
        assert_eq!(word.text, "TOTAL");
        assert!(word.auto_corrected);
        assert!(!word.corrected);
        assert_eq!(word.original_value.as_deref(), Some("T0TAL"));
        assert_eq!(word.corrected_at, Some(now));
        assert_eq!(doc.words().nth(1).unwrap().original_value, None);
    }

    #[test]
    fn test_document_keeps_token_padding() {
        let snap = snapshot(&[("teh", "the")]);
        let applicator = LexiconApplicator::new(&snap);
        let mut doc = document(&[" teh\t", "teh"]);

        let applied = applicator.apply_to_document(&mut doc, Utc::now());

        let texts: Vec<&str> = doc.words().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec![" the\t", "the"]);
        assert_eq!(applied[0].original, " teh\t");
        assert_eq!(applied[0].corrected, " the\t");
        assert_eq!(
            doc.words().next().unwrap().original_value.as_deref(),
            Some(" teh\t")
        );
        assert!(applicator.apply_to_document(&mut doc, Utc::now()).is_empty());
    }

    #[test]
    fn test_text_falls_back_to_shorter_key() {
        let snap = snapshot(&[("INV NO", "INVOICE NO"), ("INV", "INVOICE")]);
        let applicator = LexiconApplicator::new(&snap);

        let result = applicator.apply_to_text("INV NOX", Utc::now());
        assert_eq!(result.text, "INVOICE NOX");
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.applied[0].original, "INV");

        let result = applicator.apply_to_text("INV NO 12, INVNO", Utc::now());
        assert_eq!(result.text, "INVOICE NO 12, INVNO");
    }

    #[test]
    fn test_text_keys_ending_in_punctuation() {
        let snap = snapshot(&[("N0.", "No.")]);
        let applicator = LexiconApplicator::new(&snap);

        let result = applicator.apply_to_text("N0. 5, N0.5 AN0.", Utc::now());
        assert_eq!(result.text, "No. 5, N0.5 AN0.");
    }

    #[test]
    fn test_reapplication_is_noop() {
        let snap = snapshot(&[("teh", "the")]);
        let applicator = LexiconApplicator::new(&snap);
        let mut doc = document(&["teh", "cat"]);

        assert_eq!(applicator.apply_to_document(&mut doc, Utc::now()).len(), 1);
        assert!(applicator.apply_to_document(&mut doc, Utc::now()).is_empty());

        let first = applicator.apply_to_text("teh cat", Utc::now());
        let second = applicator.apply_to_text(&first.text, Utc::now());
        assert_eq!(second.text, "the cat");
        assert!(second.applied.is_empty());
    }

    #[test]
    fn test_text_matches_whole_words_only() {
        let snap = snapshot(&[("hello", "world"), ("INV NO", "INVOICE NO")]);
        let applicator = LexiconApplicator::new(&snap);

        let result = applicator.apply_to_text("Hello, othello! hello_x HELLO.\nINV  NO 7", Utc::now());

        assert_eq!(result.text, "World, othello! hello_x WORLD.\nINVOICE NO 7");
        assert_eq!(result.applied.len(), 3);
        assert_eq!(result.applied[1].method, CorrectionMethod::LexiconCaseInsensitive);
        assert_eq!(result.applied[2].method, CorrectionMethod::LexiconNormalized);
        assert_eq!(result.applied[2].original, "INV  NO");
    }

    #[test]
    fn test_suggestions() {
        let snap = snapshot(&[("0RDER", "ORDER"), ("T0TAL", "TOTAL")]);
        let applicator = LexiconApplicator::new(&snap);

        let suggestions = applicator.suggestions("Purchase 0rder #12");
        assert_eq!(
            suggestions,
            vec![Suggestion {
                original: "0RDER".to_string(),
                corrected: "ORDER".to_string(),
            }]
        );
    }
}
