//! SQLite schema for the checkpoint store

use crate::error::Result;
use rusqlite::Connection;

/// Columns of the `records` table, in table order
pub const RECORD_COLUMNS: [&str; 12] = [
    "id",
    "title",
    "organization",
    "category",
    "method",
    "due_date",
    "announce_date",
    "budget",
    "counterparty",
    "detail_url",
    "raw_payload",
    "created_at",
];

/// Create tables and indexes; safe to run on every open
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Normalized notices
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            organization TEXT NOT NULL,
            category TEXT NOT NULL,
            method TEXT,
            due_date TEXT,
            announce_date TEXT,
            budget TEXT NOT NULL DEFAULT '',
            counterparty TEXT,
            detail_url TEXT NOT NULL,
            raw_payload TEXT NOT NULL,  -- JSON
            created_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    // One checkpoint row per notice id
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS completion (
            id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('SUCCESS', 'FAILED')),
            error_msg TEXT,
            completed_at TEXT NOT NULL
        )
        "#,
        [],
    )?;

    // One row per harvest run
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            found INTEGER NOT NULL DEFAULT 0,
            collected INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0,
            pages_processed INTEGER NOT NULL DEFAULT 0,
            pages_failed INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('RUNNING', 'COMPLETED'))
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_completion_status ON completion(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_organization ON records(organization)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_due_date ON records(due_date)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('records', 'completion', 'sessions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 3);
    }

    #[test]
    fn test_record_columns_match_table() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('records')").unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(columns, RECORD_COLUMNS);
    }
}
