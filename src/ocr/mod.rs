//! OCR word stream
//!
//! Types for the page → block → line → word stream produced by an external
//! recognizer, plus the collaborator traits the engine consumes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocr_corrections::ocr::{OcrDocument, OcrWord, OcrRect};
//!
//! let word = OcrWord::new("INV-001", 0.91, OcrRect { x: 0.1, y: 0.1, width: 0.2, height: 0.03 });
//! let document = OcrDocument::from_words(vec![word]);
//! assert_eq!(document.full_text(), "INV-001");
//! ```

mod provider;
mod types;

pub use provider::{DocumentClassifier, OcrWordSource};
pub use types::{
    AppliedCorrection, CorrectionMethod, OcrBlock, OcrDocument, OcrError, OcrLine, OcrPage, OcrRect,
    OcrWord,
};

#[cfg(test)]
pub(crate) use provider::MockSource;
