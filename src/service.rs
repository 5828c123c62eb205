//! Correction service
//!
//! The exposed interface of the engine. Wires the correction store, lexicon
//! learner, lexicon applicator and resolver together and owns the caches in
//! front of them.
//!
//! Caches follow an invalidate-on-write contract: an accepted submission is
//! added to the loaded correction index, and a lexicon change evicts the
//! affected scope's snapshot. Generation counters stop a load that raced
//! with a write from installing stale state.

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::corrections::{self, Correction, CorrectionRepository, CorrectionStatistics, NewCorrection};
use crate::db;
use crate::error::Result;
use crate::lexicon::{
    LexiconApplicator, LexiconEntry, LexiconLearner, LexiconRepository, LexiconSnapshot,
    PromotionOutcome, Scope, Suggestion, TextCorrection,
};
use crate::ocr::{AppliedCorrection, DocumentClassifier, OcrDocument, OcrRect, OcrWordSource};
use crate::resolver::{resolve_document, CorrectionIndex};

/// Document being corrected and the type that selects its lexicon scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "documentType", default)]
    pub document_type: Option<String>,
}

impl DocumentContext {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            document_type: None,
        }
    }

    pub fn with_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    pub fn scope(&self) -> Scope {
        Scope::from_document_type(self.document_type.as_deref())
    }
}

/// A reviewer's correction of one token
#[derive(Debug, Clone, Deserialize)]
pub struct CorrectionSubmission {
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

impl CorrectionSubmission {
    pub fn new(
        position_ref: impl Into<String>,
        original_text: impl Into<String>,
        corrected_text: impl Into<String>,
        submitter: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            position_ref: position_ref.into(),
            original_text: original_text.into(),
            corrected_text: corrected_text.into(),
            submitter: submitter.into(),
            timestamp,
            geometry: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "correctionId", skip_serializing_if = "Option::is_none")]
    pub correction_id: Option<String>,
    /// The submission inserted or changed a lexicon entry
    #[serde(rename = "lexiconUpdated")]
    pub lexicon_updated: bool,
}

/// Output of a correction pass; the input document is never modified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectedDocument {
    pub document: OcrDocument,
    pub scope: Scope,
    pub applied: Vec<AppliedCorrection>,
}

/// Shared correction engine
#[derive(Clone)]
pub struct CorrectionService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: Config,
    db: SqlitePool,
    history: RwLock<Option<Arc<CorrectionIndex>>>,
    history_generation: AtomicU64,
    lexicons: Mutex<LruCache<Scope, Arc<LexiconSnapshot>>>,
    lexicon_generation: AtomicU64,
}

impl CorrectionService {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        let capacity = NonZeroUsize::new(config.cache.lexicon_snapshots).unwrap_or(NonZeroUsize::MIN);

        Self {
            inner: Arc::new(ServiceInner {
                config,
                db,
                history: RwLock::new(None),
                history_generation: AtomicU64::new(0),
                lexicons: Mutex::new(LruCache::new(capacity)),
                lexicon_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Open the configured database and build a service over it
    pub async fn connect(config: Config) -> Result<Self> {
        let db = db::create_pool(&config.database.url).await?;
        Ok(Self::new(config, db))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Run the lexicon stage (when enabled for the scope) and then resolve
    /// every word against the correction history.
    ///
    /// On error the caller still holds the uncorrected input.
    pub async fn apply_corrections(
        &self,
        context: &DocumentContext,
        document: &OcrDocument,
    ) -> Result<CorrectedDocument> {
        let scope = context.scope();
        let mut corrected = document.clone();
        let mut applied = Vec::new();

        if self.inner.config.learning.auto_correction_enabled(&scope) {
            let snapshot = self.lexicon(&scope).await?;
            applied.extend(LexiconApplicator::new(&snapshot).apply_to_document(&mut corrected, Utc::now()));
        }

        let history = self.history().await?;
        applied.extend(resolve_document(&history, &mut corrected));

        tracing::info!(
            "Applied {} corrections to {} ({} words, scope {})",
            applied.len(),
            context.document_id,
            corrected.word_count(),
            scope
        );

        Ok(CorrectedDocument {
            document: corrected,
            scope,
            applied,
        })
    }

    /// Record a reviewer correction.
    ///
    /// The append, the frequency increment and any resulting promotion
    /// commit together. No-op and malformed submissions are answered with
    /// `accepted: false` and touch nothing.
    pub async fn submit_correction(
        &self,
        context: &DocumentContext,
        submission: CorrectionSubmission,
    ) -> Result<SubmissionResponse> {
        let new = NewCorrection {
            document_id: Some(context.document_id.clone()),
            position_ref: submission.position_ref,
            original_text: submission.original_text,
            corrected_text: submission.corrected_text,
            submitter: submission.submitter,
            timestamp: submission.timestamp,
            geometry: submission.geometry,
        };

        if let Err(reason) = new.validate() {
            tracing::debug!("Rejected correction on {}: {}", context.document_id, reason);
            return Ok(SubmissionResponse {
                accepted: false,
                reason: Some(reason.to_string()),
                correction_id: None,
                lexicon_updated: false,
            });
        }

        let scope = context.scope();
        let learner = LexiconLearner::new(&self.inner.config.learning);

        let mut tx = self.inner.db.begin().await?;
        let correction = corrections::append(&mut *tx, &new).await?;
        let outcome = learner
            .observe(&mut *tx, &new.original_text, &new.corrected_text, &scope)
            .await?;
        tx.commit().await?;

        self.record_in_history(&correction);
        if outcome.changed() {
            self.invalidate_lexicon(&scope);
        }

        tracing::info!(
            "Recorded correction {} on {}: '{}' -> '{}'",
            correction.id,
            context.document_id,
            correction.original_text,
            correction.corrected_text
        );

        Ok(SubmissionResponse {
            accepted: true,
            reason: None,
            correction_id: Some(correction.id),
            lexicon_updated: matches!(
                outcome,
                PromotionOutcome::Inserted(_) | PromotionOutcome::Updated { .. }
            ),
        })
    }

    /// Merged original → corrected mapping visible in a scope
    pub async fn get_lexicon_snapshot(&self, scope: &Scope) -> Result<BTreeMap<String, String>> {
        Ok(self.lexicon(scope).await?.to_map())
    }

    /// Entries stored in exactly this scope, with their frequencies
    pub async fn lexicon_entries(&self, scope: &Scope) -> Result<Vec<LexiconEntry>> {
        LexiconRepository::new(&self.inner.db).entries(scope).await
    }

    pub async fn frequency(&self, original: &str, corrected: &str, scope: &Scope) -> Result<u64> {
        LexiconRepository::new(&self.inner.db)
            .frequency(original, corrected, scope)
            .await
    }

    /// Apply the lexicon to free text at word boundaries
    pub async fn apply_lexicon_to_text(&self, context: &DocumentContext, text: &str) -> Result<TextCorrection> {
        let snapshot = self.lexicon(&context.scope()).await?;
        Ok(LexiconApplicator::new(&snapshot).apply_to_text(text, Utc::now()))
    }

    /// Lexicon entries whose key occurs in the text; the text is not changed
    pub async fn suggestions(&self, context: &DocumentContext, text: &str) -> Result<Vec<Suggestion>> {
        let snapshot = self.lexicon(&context.scope()).await?;
        Ok(LexiconApplicator::new(&snapshot).suggestions(text))
    }

    pub async fn correction_statistics(&self, document_id: Option<&str>) -> Result<CorrectionStatistics> {
        CorrectionRepository::new(&self.inner.db)
            .statistics(document_id)
            .await
    }

    /// Recognize a document, classify it when the context has no type, and
    /// correct it.
    pub async fn process_document(
        &self,
        context: &DocumentContext,
        source: &dyn OcrWordSource,
        classifier: &dyn DocumentClassifier,
    ) -> Result<CorrectedDocument> {
        let document = source.recognize(&context.document_id).await?;
        tracing::debug!(
            "{} recognized {} words in {}",
            source.name(),
            document.word_count(),
            context.document_id
        );

        let mut context = context.clone();
        if context.document_type.is_none() {
            context.document_type = classifier.classify(&document);
        }

        self.apply_corrections(&context, &document).await
    }

    async fn history(&self) -> Result<Arc<CorrectionIndex>> {
        let cached = self.inner.history.read().clone();
        if let Some(index) = cached {
            return Ok(index);
        }

        let generation = self.inner.history_generation.load(Ordering::Acquire);
        let corrections = CorrectionRepository::new(&self.inner.db).list_all().await?;
        let index = Arc::new(CorrectionIndex::build(&self.inner.config.resolver, &corrections));
        tracing::debug!("Built correction index from {} corrections", index.len());

        let mut slot = self.inner.history.write();
        if slot.is_none() && self.inner.history_generation.load(Ordering::Acquire) == generation {
            *slot = Some(index.clone());
        }
        Ok(index)
    }

    fn record_in_history(&self, correction: &Correction) {
        let mut slot = self.inner.history.write();
        self.inner.history_generation.fetch_add(1, Ordering::AcqRel);
        if let Some(index) = slot.as_mut() {
            Arc::make_mut(index).insert(correction);
        }
    }

    async fn lexicon(&self, scope: &Scope) -> Result<Arc<LexiconSnapshot>> {
        let cached = self.inner.lexicons.lock().get(scope).cloned();
        if let Some(snapshot) = cached {
            return Ok(snapshot);
        }

        let generation = self.inner.lexicon_generation.load(Ordering::Acquire);
        let snapshot = Arc::new(LexiconRepository::new(&self.inner.db).snapshot(scope).await?);

        let mut lexicons = self.inner.lexicons.lock();
        if self.inner.lexicon_generation.load(Ordering::Acquire) == generation {
            lexicons.put(scope.clone(), snapshot.clone());
        }
        Ok(snapshot)
    }

    fn invalidate_lexicon(&self, scope: &Scope) {
        let mut lexicons = self.inner.lexicons.lock();
        self.inner.lexicon_generation.fetch_add(1, Ordering::AcqRel);
        match scope {
            Scope::Global => lexicons.clear(),
            Scope::DocumentType(_) => {
                lexicons.pop(scope);
            }
        }
    }
}
