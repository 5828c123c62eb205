//! OCR Types
//!
//! Defines the word-level stream that corrections are applied to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized rectangle (0-1 coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcrRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl OcrRect {
    /// Whether the box lies inside the unit square
    pub fn is_normalized(&self) -> bool {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        in_unit(self.x)
            && in_unit(self.y)
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0 + f64::EPSILON
            && self.y + self.height <= 1.0 + f64::EPSILON
    }
}

/// How a word's text was changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// History match on the verbatim token
    Exact,
    /// History match after stripping trailing filler
    Fuzzy,
    /// History match on a known leading pattern
    Prefix,
    /// History match ignoring case
    CaseInsensitive,
    LexiconExact,
    LexiconCaseInsensitive,
    LexiconNormalized,
}

impl CorrectionMethod {
    /// Whether the change came from the learned lexicon rather than history
    pub fn is_lexicon(&self) -> bool {
        matches!(
            self,
            Self::LexiconExact | Self::LexiconCaseInsensitive | Self::LexiconNormalized
        )
    }
}

/// One change made to a word or to free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedCorrection {
    pub original: String,
    pub corrected: String,
    pub method: CorrectionMethod,
    #[serde(rename = "appliedAt")]
    pub applied_at: DateTime<Utc>,
}

/// Single recognized word with correction annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    /// Word text (corrected text once a correction applies)
    pub text: String,
    /// Recognizer confidence in [0, 1]
    pub confidence: f64,
    /// Bounding box (normalized coordinates)
    pub bounds: OcrRect,
    /// Changed by reviewer history
    #[serde(default)]
    pub corrected: bool,
    /// Changed by the learned lexicon
    #[serde(default)]
    pub auto_corrected: bool,
    /// Text as recognized, before any correction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_method: Option<CorrectionMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_by: Option<String>,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f64, bounds: OcrRect) -> Self {
        Self {
            text: text.into(),
            confidence,
            bounds,
            corrected: false,
            auto_corrected: false,
            original_value: None,
            correction_method: None,
            corrected_at: None,
            corrected_by: None,
        }
    }

    /// Replace the text and annotate the change.
    ///
    /// `original_value` keeps the recognizer's text across multiple stages.
    pub fn apply_correction(
        &mut self,
        text: String,
        method: CorrectionMethod,
        at: DateTime<Utc>,
        by: Option<String>,
    ) {
        if self.original_value.is_none() {
            self.original_value = Some(std::mem::take(&mut self.text));
        }
        self.text = text;
        if method.is_lexicon() {
            self.auto_corrected = true;
        } else {
            self.corrected = true;
        }
        self.correction_method = Some(method);
        self.corrected_at = Some(at);
        self.corrected_by = by;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrBlock {
    pub lines: Vec<OcrLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    pub blocks: Vec<OcrBlock>,
}

/// Recognized document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    pub pages: Vec<OcrPage>,
}

impl OcrDocument {
    /// Single page, single block, single line document
    pub fn from_words(words: Vec<OcrWord>) -> Self {
        Self {
            pages: vec![OcrPage {
                blocks: vec![OcrBlock {
                    lines: vec![OcrLine { words }],
                }],
            }],
        }
    }

    /// Words in reading order
    pub fn words(&self) -> impl Iterator<Item = &OcrWord> {
        self.pages
            .iter()
            .flat_map(|p| p.blocks.iter())
            .flat_map(|b| b.lines.iter())
            .flat_map(|l| l.words.iter())
    }

    pub fn words_mut(&mut self) -> impl Iterator<Item = &mut OcrWord> {
        self.pages
            .iter_mut()
            .flat_map(|p| p.blocks.iter_mut())
            .flat_map(|b| b.lines.iter_mut())
            .flat_map(|l| l.words.iter_mut())
    }

    pub fn word_count(&self) -> usize {
        self.words().count()
    }

    /// Space-joined text, as handed to field extraction
    pub fn full_text(&self) -> String {
        self.words()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> OcrRect {
        OcrRect { x: 0.1, y: 0.2, width: 0.3, height: 0.05 }
    }

    #[test]
    fn test_rect_normalization() {
        assert!(rect().is_normalized());
        assert!(!OcrRect { x: 0.9, y: 0.1, width: 0.3, height: 0.1 }.is_normalized());
        assert!(!OcrRect { x: -0.1, y: 0.1, width: 0.1, height: 0.1 }.is_normalized());
    }

    #[test]
    fn test_apply_correction_keeps_first_original() {
        let mut word = OcrWord::new("he1lo", 0.5, rect());
        let now = Utc::now();

        word.apply_correction("hello".to_string(), CorrectionMethod::LexiconExact, now, None);
        word.apply_correction(
            "Hello".to_string(),
            CorrectionMethod::CaseInsensitive,
            now,
            Some("analyst1".to_string()),
        );

        assert_eq!(word.text, "Hello");
        assert_eq!(word.original_value.as_deref(), Some("he1lo"));
        assert!(word.auto_corrected);
        assert!(word.corrected);
        assert_eq!(word.correction_method, Some(CorrectionMethod::CaseInsensitive));
        assert_eq!(word.corrected_by.as_deref(), Some("analyst1"));
    }

    #[test]
    fn test_document_text_and_serialization() {
        let mut doc = OcrDocument::from_words(vec![
            OcrWord::new("Total", 0.99, rect()),
            OcrWord::new("42.00", 0.87, rect()),
        ]);
        assert_eq!(doc.word_count(), 2);
        assert_eq!(doc.full_text(), "Total 42.00");

        for word in doc.words_mut() {
            word.text = word.text.to_uppercase();
        }
        assert_eq!(doc.full_text(), "TOTAL 42.00");

        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("original_value"));
        let back: OcrDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&CorrectionMethod::CaseInsensitive).unwrap();
        assert_eq!(json, "\"case_insensitive\"");
        assert!(CorrectionMethod::LexiconNormalized.is_lexicon());
        assert!(!CorrectionMethod::Prefix.is_lexicon());
    }
}
