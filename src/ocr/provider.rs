//! OCR collaborators
//!
//! The engine never recognizes text itself; it pulls a word stream from an
//! [`OcrWordSource`] and asks a [`DocumentClassifier`] for the document type.

use async_trait::async_trait;

use super::types::{OcrDocument, OcrError};

/// Producer of recognized word streams
#[async_trait]
pub trait OcrWordSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Recognize a stored document
    async fn recognize(&self, document_id: &str) -> Result<OcrDocument, OcrError>;
}

/// Supplies the document type that selects lexicon scope and thresholds
pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, document: &OcrDocument) -> Option<String>;
}

impl<F> DocumentClassifier for F
where
    F: Fn(&OcrDocument) -> Option<String> + Send + Sync,
{
    fn classify(&self, document: &OcrDocument) -> Option<String> {
        self(document)
    }
}

/// Mock source for testing
#[cfg(test)]
pub struct MockSource {
    pub document: Option<OcrDocument>,
}

#[cfg(test)]
#[async_trait]
impl OcrWordSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn recognize(&self, document_id: &str) -> Result<OcrDocument, OcrError> {
        self.document
            .clone()
            .ok_or_else(|| OcrError::ProviderNotAvailable(format!("no output for {}", document_id)))
    }
}
