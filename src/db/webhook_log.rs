//! Append-only log of raw inbound provider events

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{DbPool, parse_datetime};
use crate::{Error, Result};

/// Source tag for events received from the messaging provider
pub const SOURCE_PROVIDER: &str = "uazapi";

/// A logged inbound event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: i64,
    pub source: String,
    pub instance_id: Option<String>,
    /// Raw body, byte-for-byte as received
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Repository for webhook log operations
#[derive(Clone)]
pub struct WebhookLogRepo {
    pool: DbPool,
}

impl WebhookLogRepo {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a raw event, returning its row id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn append(&self, source: &str, instance_id: &str, payload: &[u8]) -> Result<i64> {
        let conn = super::conn(&self.pool)?;

        conn.execute(
            "INSERT INTO webhooks_log (source, instance_id, payload) VALUES (?1, ?2, ?3)",
            params![source, instance_id, payload],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent events, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn recent(&self, limit: usize) -> Result<Vec<WebhookEvent>> {
        let conn = super::conn(&self.pool)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                "SELECT id, source, instance_id, payload, created_at FROM webhooks_log
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let created_at: String = row.get(4)?;
                Ok(WebhookEvent {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    instance_id: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: parse_datetime(&created_at),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }
}
