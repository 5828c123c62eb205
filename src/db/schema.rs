//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Append-only log of reviewer corrections
CREATE TABLE IF NOT EXISTS corrections (
    id TEXT PRIMARY KEY,
    -- NULL for corrections imported without a source document
    document_id TEXT,
    position_ref TEXT NOT NULL DEFAULT '',
    -- Nullable so legacy imports can be stored; such rows are skipped on read
    original_text TEXT,
    corrected_text TEXT,
    submitter TEXT NOT NULL DEFAULT '',
    -- RFC 3339, UTC, fixed microsecond precision so text order is time order
    timestamp TEXT NOT NULL,
    -- Normalized bounding box (JSON object)
    geometry_json TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_corrections_document_id ON corrections(document_id);
CREATE INDEX IF NOT EXISTS idx_corrections_timestamp ON corrections(timestamp);

-- Observation counters driving lexicon promotion
CREATE TABLE IF NOT EXISTS correction_frequencies (
    original_text TEXT NOT NULL,
    corrected_text TEXT NOT NULL,
    scope TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    last_seen TEXT NOT NULL,

    PRIMARY KEY (original_text, corrected_text, scope)
);

-- Learned lexicon, one active correction per (key, scope)
CREATE TABLE IF NOT EXISTS lexicon_entries (
    id TEXT PRIMARY KEY,
    key TEXT NOT NULL,
    scope TEXT NOT NULL,
    corrected_text TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    UNIQUE(key, scope)
);

CREATE INDEX IF NOT EXISTS idx_lexicon_scope ON lexicon_entries(scope);
"#;
