//! Lexicon and frequency persistence
//!
//! Writes that must be atomic with a correction append take an open
//! connection so they can run inside the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::types::{LexiconEntry, LexiconSnapshot, PromotionOutcome, Scope};
use crate::corrections::format_timestamp;
use crate::error::{CoreError, Result};

/// Repository for lexicon reads
pub struct LexiconRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LexiconRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Merged snapshot for a scope: global entries plus the scope's own
    pub async fn snapshot(&self, scope: &Scope) -> Result<LexiconSnapshot> {
        let global = self.pairs(&Scope::Global).await?;
        let typed = match scope {
            Scope::Global => Vec::new(),
            Scope::DocumentType(_) => self.pairs(scope).await?,
        };
        Ok(LexiconSnapshot::new(global, typed))
    }

    /// Entries stored in exactly this scope
    pub async fn entries(&self, scope: &Scope) -> Result<Vec<LexiconEntry>> {
        let rows = sqlx::query_as::<_, LexiconRow>(
            r#"
            SELECT id, key, scope, corrected_text, frequency, created_at, updated_at
            FROM lexicon_entries
            WHERE scope = ?
            ORDER BY key ASC
            "#,
        )
        .bind(scope.as_str())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(LexiconRow::into_entry).collect())
    }

    /// Observation count for an ordered pair in a scope
    pub async fn frequency(&self, original: &str, corrected: &str, scope: &Scope) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        frequency(&mut conn, original, corrected, scope).await
    }

    async fn pairs(&self, scope: &Scope) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, corrected_text FROM lexicon_entries WHERE scope = ?",
        )
        .bind(scope.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Increment the counter for a pair and return the new value
pub(crate) async fn increment_frequency(
    conn: &mut SqliteConnection,
    original: &str,
    corrected: &str,
    scope: &Scope,
) -> Result<u64> {
    let now = format_timestamp(&Utc::now());

    let (frequency,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO correction_frequencies (original_text, corrected_text, scope, frequency, last_seen)
        VALUES (?, ?, ?, 1, ?)
        ON CONFLICT(original_text, corrected_text, scope) DO UPDATE SET
            frequency = frequency + 1,
            last_seen = excluded.last_seen
        RETURNING frequency
        "#,
    )
    .bind(original)
    .bind(corrected)
    .bind(scope.as_str())
    .bind(&now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(frequency as u64)
}

pub(crate) async fn frequency(
    conn: &mut SqliteConnection,
    original: &str,
    corrected: &str,
    scope: &Scope,
) -> Result<u64> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT frequency FROM correction_frequencies
        WHERE original_text = ? AND corrected_text = ? AND scope = ?
        "#,
    )
    .bind(original)
    .bind(corrected)
    .bind(scope.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|(f,)| f as u64).unwrap_or(0))
}

/// Insert or overwrite the entry for (key, scope).
///
/// The UNIQUE(key, scope) constraint keeps concurrent promotions of the
/// same key from producing two rows.
pub(crate) async fn upsert_entry(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &Scope,
    corrected: &str,
    frequency: u64,
) -> Result<PromotionOutcome> {
    let existing = fetch_entry(conn, key, scope).await?;
    if let Some(entry) = &existing {
        if entry.corrected_text == corrected {
            return Ok(PromotionOutcome::Unchanged(entry.clone()));
        }
    }

    let now = format_timestamp(&Utc::now());
    sqlx::query(
        r#"
        INSERT INTO lexicon_entries (id, key, scope, corrected_text, frequency, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(key, scope) DO UPDATE SET
            corrected_text = excluded.corrected_text,
            frequency = excluded.frequency,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(key)
    .bind(scope.as_str())
    .bind(corrected)
    .bind(frequency as i64)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    let entry = fetch_entry(conn, key, scope).await?.ok_or_else(|| {
        CoreError::Internal(format!("Failed to fetch upserted lexicon entry {}", key))
    })?;

    Ok(match existing {
        Some(previous) => PromotionOutcome::Updated {
            entry,
            previous: previous.corrected_text,
        },
        None => PromotionOutcome::Inserted(entry),
    })
}

async fn fetch_entry(
    conn: &mut SqliteConnection,
    key: &str,
    scope: &Scope,
) -> Result<Option<LexiconEntry>> {
    let row = sqlx::query_as::<_, LexiconRow>(
        r#"
        SELECT id, key, scope, corrected_text, frequency, created_at, updated_at
        FROM lexicon_entries
        WHERE key = ? AND scope = ?
        "#,
    )
    .bind(key)
    .bind(scope.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(LexiconRow::into_entry))
}

#[derive(sqlx::FromRow)]
struct LexiconRow {
    id: String,
    key: String,
    scope: String,
    corrected_text: String,
    frequency: i64,
    created_at: String,
    updated_at: String,
}

impl LexiconRow {
    fn into_entry(self) -> LexiconEntry {
        LexiconEntry {
            id: self.id,
            key: self.key,
            scope: Scope::from(self.scope),
            corrected_text: self.corrected_text,
            frequency: self.frequency.max(0) as u64,
            created_at: parse_or_epoch(&self.created_at),
            updated_at: parse_or_epoch(&self.updated_at),
        }
    }
}

fn parse_or_epoch(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_frequency_increments_per_scope() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let invoice = Scope::for_type("invoice");

        assert_eq!(increment_frequency(&mut conn, "X", "Y", &Scope::Global).await.unwrap(), 1);
        assert_eq!(increment_frequency(&mut conn, "X", "Y", &Scope::Global).await.unwrap(), 2);
        assert_eq!(increment_frequency(&mut conn, "X", "Y", &invoice).await.unwrap(), 1);
        assert_eq!(increment_frequency(&mut conn, "X", "Z", &Scope::Global).await.unwrap(), 1);
        drop(conn);

        let repo = LexiconRepository::new(&pool);
        assert_eq!(repo.frequency("X", "Y", &Scope::Global).await.unwrap(), 2);
        assert_eq!(repo.frequency("X", "Q", &Scope::Global).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_insert_update_unchanged() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let outcome = upsert_entry(&mut conn, "X", &Scope::Global, "Y", 2).await.unwrap();
        assert!(matches!(outcome, PromotionOutcome::Inserted(_)));

        let outcome = upsert_entry(&mut conn, "X", &Scope::Global, "Y", 3).await.unwrap();
        assert!(matches!(outcome, PromotionOutcome::Unchanged(_)));
        assert!(!outcome.changed());

        let outcome = upsert_entry(&mut conn, "X", &Scope::Global, "Z", 2).await.unwrap();
        match outcome {
            PromotionOutcome::Updated { entry, previous } => {
                assert_eq!(previous, "Y");
                assert_eq!(entry.corrected_text, "Z");
            }
            other => panic!("expected update, got {:?}", other),
        }
        drop(conn);

        let repo = LexiconRepository::new(&pool);
        let entries = repo.entries(&Scope::Global).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].corrected_text, "Z");
    }

    #[tokio::test]
    async fn test_snapshot_merges_scopes() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let invoice = Scope::for_type("invoice");

        upsert_entry(&mut conn, "T0TAL", &Scope::Global, "TOTAL", 3).await.unwrap();
        upsert_entry(&mut conn, "0RDER", &Scope::Global, "ORDER", 3).await.unwrap();
        upsert_entry(&mut conn, "T0TAL", &invoice, "TOTAL DUE", 1).await.unwrap();
        upsert_entry(&mut conn, "VAT1", &Scope::for_type("receipt"), "VAT", 1).await.unwrap();
        drop(conn);

        let repo = LexiconRepository::new(&pool);

        let global = repo.snapshot(&Scope::Global).await.unwrap();
        assert_eq!(global.len(), 2);
        assert_eq!(global.get("T0TAL"), Some("TOTAL"));

        let typed = repo.snapshot(&invoice).await.unwrap();
        assert_eq!(typed.len(), 2);
        assert_eq!(typed.get("T0TAL"), Some("TOTAL DUE"));
        assert_eq!(typed.get("VAT1"), None);
    }
}
