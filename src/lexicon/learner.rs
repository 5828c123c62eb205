//! Frequency-driven lexicon learning
//!
//! Every accepted correction is an observation of an (original, corrected)
//! pair within a scope. Once the pair has been observed as often as the
//! scope's threshold requires, it is written to the lexicon.

use sqlx::SqliteConnection;

use super::store;
use super::types::{normalize_key, PromotionOutcome, Scope};
use crate::config::LearningConfig;
use crate::error::Result;

pub struct LexiconLearner<'a> {
    config: &'a LearningConfig,
}

impl<'a> LexiconLearner<'a> {
    pub fn new(config: &'a LearningConfig) -> Self {
        Self { config }
    }

    /// Count one more observation of the pair, returning the new frequency
    pub async fn record_observation(
        &self,
        conn: &mut SqliteConnection,
        original: &str,
        corrected: &str,
        scope: &Scope,
    ) -> Result<u64> {
        store::increment_frequency(conn, original, corrected, scope).await
    }

    /// Promote the pair if its frequency has reached the scope threshold
    pub async fn evaluate_promotion(
        &self,
        conn: &mut SqliteConnection,
        original: &str,
        corrected: &str,
        scope: &Scope,
    ) -> Result<PromotionOutcome> {
        let frequency = store::frequency(conn, original, corrected, scope).await?;
        let threshold = self.config.learning_threshold(scope);

        if frequency < u64::from(threshold) {
            tracing::debug!(
                "'{}' -> '{}' seen {} of {} times in {}",
                original,
                corrected,
                frequency,
                threshold,
                scope
            );
            return Ok(PromotionOutcome::BelowThreshold { frequency, threshold });
        }

        let key = normalize_key(original);
        let outcome = store::upsert_entry(conn, &key, scope, corrected, frequency).await?;

        match &outcome {
            PromotionOutcome::Inserted(entry) => tracing::info!(
                "Learned lexicon entry in {}: '{}' -> '{}' (seen {} times)",
                scope,
                entry.key,
                entry.corrected_text,
                frequency
            ),
            PromotionOutcome::Updated { entry, previous } => tracing::info!(
                "Updated lexicon entry in {}: '{}' -> '{}' (was '{}')",
                scope,
                entry.key,
                entry.corrected_text,
                previous
            ),
            _ => {}
        }

        Ok(outcome)
    }

    /// Record the observation and evaluate promotion on the same connection.
    ///
    /// Run inside a transaction so the increment and the promotion it
    /// triggers commit together.
    pub async fn observe(
        &self,
        conn: &mut SqliteConnection,
        original: &str,
        corrected: &str,
        scope: &Scope,
    ) -> Result<PromotionOutcome> {
        self.record_observation(conn, original, corrected, scope).await?;
        self.evaluate_promotion(conn, original, corrected, scope).await
    }
}
