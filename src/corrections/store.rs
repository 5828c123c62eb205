//! Correction log persistence
//!
//! SQLite storage for the append-only correction log.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::types::{
    format_timestamp, Correction, CorrectionStatistics, DataIntegrityWarning, NewCorrection,
    PatternCount, RecordOutcome,
};
use crate::error::Result;
use crate::ocr::OcrRect;

const SELECT_COLUMNS: &str = r#"
    SELECT rowid AS sequence, id, document_id, position_ref, original_text,
           corrected_text, submitter, timestamp, geometry_json
    FROM corrections
"#;

/// Repository for the correction log
pub struct CorrectionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CorrectionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Validate and append a correction.
    ///
    /// Rejected submissions leave the store untouched.
    pub async fn record(&self, new: &NewCorrection) -> Result<RecordOutcome> {
        if let Err(reason) = new.validate() {
            return Ok(RecordOutcome::Rejected(reason));
        }

        let mut conn = self.pool.acquire().await?;
        let correction = append(&mut conn, new).await?;
        Ok(RecordOutcome::Recorded(correction))
    }

    /// Corrections made on one document, newest first
    pub async fn list_for_document(&self, document_id: &str) -> Result<Vec<Correction>> {
        let rows = sqlx::query_as::<_, CorrectionRow>(&format!(
            "{} WHERE document_id = ? ORDER BY timestamp DESC, rowid DESC",
            SELECT_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(self.pool)
        .await?;

        Ok(valid_corrections(rows))
    }

    /// Corrections visible globally, excluding one document, newest first.
    ///
    /// Corrections without a source document are always included.
    pub async fn list_global(&self, excluding: Option<&str>) -> Result<Vec<Correction>> {
        let rows = sqlx::query_as::<_, CorrectionRow>(&format!(
            "{} WHERE ? IS NULL OR document_id IS NULL OR document_id != ? \
             ORDER BY timestamp DESC, rowid DESC",
            SELECT_COLUMNS
        ))
        .bind(excluding)
        .bind(excluding)
        .fetch_all(self.pool)
        .await?;

        Ok(valid_corrections(rows))
    }

    /// Entire history, newest first
    pub async fn list_all(&self) -> Result<Vec<Correction>> {
        self.list_global(None).await
    }

    /// Number of stored rows, including unusable ones
    pub async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM corrections")
            .fetch_one(self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Aggregate statistics, optionally for one document
    pub async fn statistics(&self, document_id: Option<&str>) -> Result<CorrectionStatistics> {
        let (total, last): (i64, Option<String>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), MAX(timestamp)
            FROM corrections
            WHERE ? IS NULL OR document_id = ?
            "#,
        )
        .bind(document_id)
        .bind(document_id)
        .fetch_one(self.pool)
        .await?;

        let by_submitter: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT submitter, COUNT(*)
            FROM corrections
            WHERE ? IS NULL OR document_id = ?
            GROUP BY submitter
            "#,
        )
        .bind(document_id)
        .bind(document_id)
        .fetch_all(self.pool)
        .await?;

        let patterns: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT original_text, corrected_text, COUNT(*) AS count
            FROM corrections
            WHERE (? IS NULL OR document_id = ?)
              AND original_text IS NOT NULL AND original_text != ''
              AND corrected_text IS NOT NULL AND corrected_text != ''
            GROUP BY original_text, corrected_text
            ORDER BY count DESC, original_text ASC
            "#,
        )
        .bind(document_id)
        .bind(document_id)
        .fetch_all(self.pool)
        .await?;

        Ok(CorrectionStatistics {
            total_corrections: total as u64,
            corrections_by_submitter: by_submitter
                .into_iter()
                .map(|(submitter, count)| (submitter, count as u64))
                .collect(),
            common_patterns: patterns
                .into_iter()
                .map(|(original_text, corrected_text, count)| PatternCount {
                    original_text,
                    corrected_text,
                    count: count as u64,
                })
                .collect(),
            last_correction_at: last.and_then(|s| parse_timestamp(&s)),
        })
    }
}

/// Append a validated correction on an open connection or transaction
pub async fn append(conn: &mut SqliteConnection, new: &NewCorrection) -> Result<Correction> {
    let id = Uuid::new_v4().to_string();
    let timestamp = new.stored_timestamp();
    let geometry_json = new
        .geometry
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        r#"
        INSERT INTO corrections (
            id, document_id, position_ref, original_text, corrected_text,
            submitter, timestamp, geometry_json
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.document_id)
    .bind(&new.position_ref)
    .bind(&new.original_text)
    .bind(&new.corrected_text)
    .bind(&new.submitter)
    .bind(format_timestamp(&timestamp))
    .bind(&geometry_json)
    .execute(&mut *conn)
    .await?;

    Ok(Correction {
        id,
        sequence: result.last_insert_rowid(),
        document_id: new.document_id.clone(),
        position_ref: new.position_ref.clone(),
        original_text: new.original_text.clone(),
        corrected_text: new.corrected_text.clone(),
        timestamp,
        submitter: new.submitter.clone(),
        geometry: new.geometry,
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert rows, logging and skipping the ones that cannot be matched on
fn valid_corrections(rows: Vec<CorrectionRow>) -> Vec<Correction> {
    rows.into_iter()
        .filter_map(|row| match row.into_correction() {
            Ok(correction) => Some(correction),
            Err(warning) => {
                tracing::warn!("Skipping stored correction: {}", warning);
                None
            }
        })
        .collect()
}

#[derive(sqlx::FromRow)]
struct CorrectionRow {
    sequence: i64,
    id: String,
    document_id: Option<String>,
    position_ref: String,
    original_text: Option<String>,
    corrected_text: Option<String>,
    submitter: String,
    timestamp: String,
    geometry_json: Option<String>,
}

impl CorrectionRow {
    fn into_correction(self) -> std::result::Result<Correction, DataIntegrityWarning> {
        let original_text = match self.original_text {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Err(DataIntegrityWarning::MissingField {
                    id: self.id,
                    field: "original_text",
                })
            }
        };
        let corrected_text = match self.corrected_text {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Err(DataIntegrityWarning::MissingField {
                    id: self.id,
                    field: "corrected_text",
                })
            }
        };

        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| {
            DataIntegrityWarning::InvalidTimestamp {
                id: self.id.clone(),
                value: self.timestamp.clone(),
            }
        })?;

        let geometry = self
            .geometry_json
            .as_deref()
            .map(serde_json::from_str::<OcrRect>)
            .transpose()
            .map_err(|e| DataIntegrityWarning::InvalidGeometry {
                id: self.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Correction {
            id: self.id,
            sequence: self.sequence,
            document_id: self.document_id,
            position_ref: self.position_ref,
            original_text,
            corrected_text,
            timestamp,
            submitter: self.submitter,
            geometry,
        })
    }
}
