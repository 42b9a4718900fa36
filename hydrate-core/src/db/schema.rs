//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: append-only drink log
    r#"
    CREATE TABLE IF NOT EXISTS drink_events (
        id               TEXT PRIMARY KEY,
        -- Unix epoch milliseconds (UTC); integer so range scans stay exact
        logged_at_ms     INTEGER NOT NULL,
        volume_ml        INTEGER NOT NULL CHECK (volume_ml > 0),
        beverage_kind    TEXT NOT NULL,
        origin           TEXT NOT NULL,
        -- Insertion order; breaks ties between same-millisecond events
        seq              INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_drink_events_logged_at ON drink_events(logged_at_ms);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_volume_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO drink_events (id, logged_at_ms, volume_ml, beverage_kind, origin, seq)
             VALUES ('x', 0, 0, 'water', 'manual_entry', 1)",
            [],
        );
        assert!(result.is_err(), "zero volume should violate CHECK");
    }

    #[test]
    fn test_insertion_order_is_required() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO drink_events (id, logged_at_ms, volume_ml, beverage_kind, origin)
             VALUES ('x', 0, 250, 'water', 'manual_entry')",
            [],
        );
        assert!(result.is_err(), "seq is NOT NULL from the first version");
    }
}
