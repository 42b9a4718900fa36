//! Database repository layer
//!
//! The event store is append-only: events are inserted and range-queried,
//! and the only deletion is the explicit full reset.

use crate::error::Result;
use crate::types::*;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Database handle with connection pooling (single connection for now)
///
/// The connection mutex is also what serializes concurrent appends from
/// one process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Drink events
    // ============================================

    /// Append one event to the log.
    ///
    /// Not idempotent: appending the same physical drink twice records it
    /// twice. Duplicate suppression is the caller's job.
    pub fn append_event(&self, event: &DrinkEvent) -> Result<()> {
        event.validate()?;
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO drink_events (id, logged_at_ms, volume_ml, beverage_kind, origin, seq)
            VALUES (?1, ?2, ?3, ?4, ?5, (SELECT COALESCE(MAX(seq), 0) + 1 FROM drink_events))
            "#,
            params![
                event.id,
                event.timestamp.timestamp_millis(),
                event.volume_ml,
                event.beverage_kind.as_str(),
                event.origin.as_str(),
            ],
        )?;
        tracing::debug!(
            id = %event.id,
            volume_ml = event.volume_ml,
            kind = %event.beverage_kind,
            origin = %event.origin,
            "Appended drink event"
        );
        Ok(())
    }

    /// Events whose timestamp lies in `[range.start, range.end)`.
    ///
    /// Returned in ascending timestamp order, though callers should not rely
    /// on it.
    pub fn query_events(&self, range: &TimeRange) -> Result<Vec<DrinkEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, logged_at_ms, volume_ml, beverage_kind, origin
            FROM drink_events
            WHERE logged_at_ms >= ?1 AND logged_at_ms < ?2
            ORDER BY logged_at_ms ASC, seq ASC
            "#,
        )?;
        let rows = stmt.query_map(
            params![range.start.timestamp_millis(), range.end.timestamp_millis()],
            Self::row_to_event,
        )?;
        let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Every stored event, oldest first.
    pub fn all_events(&self) -> Result<Vec<DrinkEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, logged_at_ms, volume_ml, beverage_kind, origin
            FROM drink_events
            ORDER BY logged_at_ms ASC, seq ASC
            "#,
        )?;
        let rows = stmt.query_map([], Self::row_to_event)?;
        let events = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    pub fn count_events(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM drink_events", [], |r| r.get(0))?;
        Ok(count)
    }

    /// Clear the log. Only for an explicit user-initiated reset.
    pub fn delete_all_events(&self) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM drink_events", [])?;
        tracing::info!(deleted, "Deleted all drink events");
        Ok(deleted)
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<DrinkEvent> {
        let logged_at_ms: i64 = row.get("logged_at_ms")?;
        let kind_str: String = row.get("beverage_kind")?;
        let origin_str: String = row.get("origin")?;

        let timestamp: DateTime<Utc> = Utc
            .timestamp_millis_opt(logged_at_ms)
            .single()
            .ok_or_else(|| invalid_column(1, format!("bad timestamp: {}", logged_at_ms)))?;

        Ok(DrinkEvent {
            id: row.get("id")?,
            timestamp,
            volume_ml: row.get("volume_ml")?,
            beverage_kind: kind_str.parse().map_err(|e| invalid_column(3, e))?,
            origin: origin_str.parse().map_err(|e| invalid_column(4, e))?,
        })
    }
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        message.into(),
    )
}
