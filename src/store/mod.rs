//! SQLite-backed visitor store.
//!
//! One `visitors` table holds the whole document: contact fields, transcript,
//! audio blob, follow-up draft, and the enrichment sub-document as a JSON
//! text column. The connection mutex is the only serialization point in the
//! process; each operation performs at most one write, so there is nothing
//! to roll back. Concurrent enrichment writes to the same record race and
//! the last writer wins.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{ConversationSummary, EnrichedData, FollowUpDraft, NewVisitor, VisitorRecord};

/// Errors from the visitor store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode enrichment data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS visitors (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    email           TEXT NOT NULL,
    company         TEXT NOT NULL DEFAULT '',
    phone           TEXT NOT NULL DEFAULT '',
    position        TEXT NOT NULL DEFAULT '',
    domain          TEXT NOT NULL DEFAULT '',
    transcript      TEXT,
    audio           BLOB,
    audio_mime_type TEXT,
    subject         TEXT NOT NULL DEFAULT '',
    body            TEXT NOT NULL DEFAULT '',
    ai_summary      TEXT NOT NULL DEFAULT '',
    enriched_data   TEXT NOT NULL DEFAULT '{}',
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visitors_created_at ON visitors(created_at);
";

const RECORD_COLUMNS: &str = "id, name, email, company, phone, position, domain, transcript, \
     audio, audio_mime_type, subject, body, ai_summary, enriched_data, created_at, updated_at";

/// Document store for visitor records.
pub struct VisitorStore {
    conn: Mutex<Connection>,
}

impl VisitorStore {
    /// Open (creating if needed) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), "visitor store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a new visitor with its creation-time follow-up draft.
    ///
    /// Generates the identifier and both timestamps. No deduplication: a
    /// retried submission creates a second record.
    pub fn insert(&self, new: &NewVisitor, draft: &FollowUpDraft) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let enriched = serde_json::to_string(&EnrichedData::default())?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO visitors (id, name, email, company, phone, position, domain, \
             transcript, audio, audio_mime_type, subject, body, ai_summary, enriched_data, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, '', ?13, ?14, ?14)",
            params![
                id.to_string(),
                new.fields.name,
                new.fields.email,
                new.fields.company,
                new.fields.phone,
                new.fields.position,
                new.fields.domain,
                new.transcript,
                new.audio.as_ref().map(|a| a.data.as_slice()),
                new.audio.as_ref().map(|a| a.mime_type.as_str()),
                draft.subject,
                draft.body,
                enriched,
                now,
            ],
        )?;

        debug!(%id, "visitor inserted");
        Ok(id)
    }

    /// Fetch one record by identifier.
    pub fn get(&self, id: Uuid) -> Result<Option<VisitorRecord>, StoreError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM visitors WHERE id = ?1", RECORD_COLUMNS),
                params![id.to_string()],
                row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    /// All records, newest first.
    pub fn list(&self) -> Result<Vec<VisitorRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM visitors ORDER BY created_at DESC, rowid DESC",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Overwrite a record's summary and enrichment sub-document.
    ///
    /// Returns false when no record with that id exists. Repeat invocations
    /// replace the previous result wholesale rather than merging.
    pub fn save_enrichment(
        &self,
        id: Uuid,
        summary: &ConversationSummary,
    ) -> Result<bool, StoreError> {
        let enriched = serde_json::to_string(&EnrichedData {
            key_points: summary.key_points.clone(),
            action_items: summary.action_items.clone(),
            sentiment: summary.sentiment.clone(),
        })?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE visitors SET ai_summary = ?1, enriched_data = ?2, updated_at = ?3 \
             WHERE id = ?4",
            params![summary.summary, enriched, now, id.to_string()],
        )?;

        Ok(rows > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<VisitorRecord> {
    let id: String = row.get(0)?;
    let enriched_raw: String = row.get(13)?;
    let created_at: String = row.get(14)?;
    let updated_at: String = row.get(15)?;

    Ok(VisitorRecord {
        id: parse_column(0, &id, Uuid::parse_str)?,
        name: row.get(1)?,
        email: row.get(2)?,
        company: row.get(3)?,
        phone: row.get(4)?,
        position: row.get(5)?,
        domain: row.get(6)?,
        transcript: row.get(7)?,
        audio: row.get(8)?,
        audio_mime_type: row.get(9)?,
        subject: row.get(10)?,
        body: row.get(11)?,
        ai_summary: row.get(12)?,
        enriched_data: parse_column(13, &enriched_raw, |s| serde_json::from_str(s))?,
        created_at: parse_column(14, &created_at, parse_timestamp)?,
        updated_at: parse_column(15, &updated_at, parse_timestamp)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn parse_column<T, E, F>(index: usize, raw: &str, parse: F) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
    F: FnOnce(&str) -> Result<T, E>,
{
    parse(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
