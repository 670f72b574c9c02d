//! Durable checkpoint store
//!
//! A single SQLite database holds the normalized notices (`records`), one
//! checkpoint row per notice id (`completion`) and one row per run
//! (`sessions`). The store is the only writer of all three tables.
//!
//! A notice row and its SUCCESS checkpoint commit in one transaction, and a
//! SUCCESS checkpoint is never downgraded: the FAILED upsert is guarded in SQL.

pub mod export;
pub mod schema;

pub use export::ExportFormat;

use crate::error::{HarvestError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tender_common::types::{
    parse_timestamp, CompletionStatus, Notice, RunSession, RunStats, SessionStatus,
};
use tracing::{debug, error, info};

/// Aggregates over the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: u64,
    pub successful: u64,
    pub failed: u64,
}

/// SQLite-backed checkpoint store
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

impl Store {
    /// Open (or create) the database at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if db_path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }

        // Create parent directory if needed
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        schema::init_schema(&conn)?;
        info!(path = %db_path.display(), "Opened checkpoint store");

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Create an in-memory store (for testing and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| HarvestError::Lock(e.to_string()))
    }

    /// Whether `id` already has a SUCCESS checkpoint
    pub fn is_already_done(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM completion WHERE id = ?1 AND status = ?2",
                params![id, CompletionStatus::Success.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Persist a notice together with its SUCCESS checkpoint.
    ///
    /// On failure nothing from the transaction remains, a FAILED checkpoint
    /// is recorded instead, and the original error is returned.
    pub fn save(&self, notice: &Notice) -> Result<()> {
        let mut conn = self.conn()?;

        match write_notice(&mut conn, notice) {
            Ok(()) => {
                debug!(id = %notice.id, "Saved notice");
                Ok(())
            },
            Err(e) => {
                error!(id = %notice.id, error = %e, "Failed to save notice");
                if let Err(mark_err) = mark_failed(&conn, &notice.id, &e.to_string()) {
                    error!(id = %notice.id, error = %mark_err, "Failed to record failure checkpoint");
                }
                Err(e)
            },
        }
    }

    /// Record a FAILED checkpoint for `id` unless it already succeeded
    pub fn log_failure(&self, id: &str, message: &str) -> Result<()> {
        let conn = self.conn()?;
        mark_failed(&conn, id, message)
    }

    /// Open a RUNNING session and return its id
    pub fn start_session(&self) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (started_at, status) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), SessionStatus::Running.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        info!(session_id = id, "Started harvest session");
        Ok(id)
    }

    /// Close a session with its final counters
    pub fn finish_session(&self, session_id: i64, stats: &RunStats) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE sessions
            SET finished_at = ?1,
                found = ?2,
                collected = ?3,
                skipped = ?4,
                errors = ?5,
                pages_processed = ?6,
                pages_failed = ?7,
                status = ?8
            WHERE id = ?9
            "#,
            params![
                Utc::now().to_rfc3339(),
                stats.found as i64,
                stats.collected as i64,
                stats.skipped as i64,
                stats.errors as i64,
                stats.pages_processed as i64,
                stats.pages_failed as i64,
                SessionStatus::Completed.as_str(),
                session_id,
            ],
        )?;

        if updated == 0 {
            return Err(HarvestError::Storage(rusqlite::Error::QueryReturnedNoRows));
        }

        info!(session_id, "Finished harvest session");
        Ok(())
    }

    /// Read back one session
    pub fn session(&self, session_id: i64) -> Result<Option<RunSession>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT started_at, finished_at, found, collected, skipped, errors,
                       pages_processed, pages_failed, status
                FROM sessions WHERE id = ?1
                "#,
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        RunStats {
                            found: row.get::<_, i64>(2)? as u64,
                            collected: row.get::<_, i64>(3)? as u64,
                            skipped: row.get::<_, i64>(4)? as u64,
                            errors: row.get::<_, i64>(5)? as u64,
                            pages_processed: row.get::<_, i64>(6)? as u64,
                            pages_failed: row.get::<_, i64>(7)? as u64,
                        },
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((started_at, finished_at, stats, status)) = row else {
            return Ok(None);
        };

        Ok(Some(RunSession {
            id: session_id,
            started_at: parse_timestamp(&started_at)?,
            finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
            stats,
            status: status.parse()?,
        }))
    }

    /// Record and checkpoint totals
    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        Ok(StoreStats {
            total_records: count(&conn, "SELECT COUNT(*) FROM records", [])?,
            successful: count_status(&conn, CompletionStatus::Success)?,
            failed: count_status(&conn, CompletionStatus::Failed)?,
        })
    }

    /// Ids whose latest attempt failed
    pub fn failed_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM completion WHERE status = ?1 ORDER BY rowid")?;
        let ids = stmt
            .query_map(params![CompletionStatus::Failed.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn record_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        count(&conn, "SELECT COUNT(*) FROM records", [])
    }

    pub fn success_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        count_status(&conn, CompletionStatus::Success)
    }

    /// Dump every record to `path`; returns the number of rows written
    pub fn export_all(&self, format: ExportFormat, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let rows = {
            let conn = self.conn()?;
            export::load_rows(&conn)?
        };

        export::write_rows(&rows, format, path)?;
        info!(%format, path = %path.display(), rows = rows.len(), "Exported records");
        Ok(rows.len())
    }

    /// Drop this handle.
    ///
    /// Clones share one connection, which is closed when the last handle goes.
    pub fn close(self) {
        debug!(
            path = ?self.path,
            handles = Arc::strong_count(&self.db),
            "Closing checkpoint store"
        );
        drop(self);
    }
}

fn write_notice(conn: &mut Connection, notice: &Notice) -> Result<()> {
    let raw_payload = notice.raw_payload_json()?;
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    tx.execute(
        r#"
        INSERT INTO records (
            id, title, organization, category, method, due_date, announce_date,
            budget, counterparty, detail_url, raw_payload, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            organization = excluded.organization,
            category = excluded.category,
            method = excluded.method,
            due_date = excluded.due_date,
            announce_date = excluded.announce_date,
            budget = excluded.budget,
            counterparty = excluded.counterparty,
            detail_url = excluded.detail_url,
            raw_payload = excluded.raw_payload
        "#,
        params![
            notice.id,
            notice.title,
            notice.organization,
            notice.category,
            notice.method,
            notice.due_date,
            notice.announce_date,
            notice.budget,
            notice.counterparty,
            notice.detail_url,
            raw_payload,
            now,
        ],
    )?;
    tx.execute(
        r#"
        INSERT INTO completion (id, status, error_msg, completed_at)
        VALUES (?1, ?2, NULL, ?3)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            error_msg = NULL,
            completed_at = excluded.completed_at
        "#,
        params![notice.id, CompletionStatus::Success.as_str(), now],
    )?;
    tx.commit()?;
    Ok(())
}

fn mark_failed(conn: &Connection, id: &str, message: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO completion (id, status, error_msg, completed_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            error_msg = excluded.error_msg,
            completed_at = excluded.completed_at
        WHERE completion.status <> ?5
        "#,
        params![
            id,
            CompletionStatus::Failed.as_str(),
            message,
            Utc::now().to_rfc3339(),
            CompletionStatus::Success.as_str()
        ],
    )?;
    Ok(())
}

fn count<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<u64> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n as u64)
}

fn count_status(conn: &Connection, status: CompletionStatus) -> Result<u64> {
    count(
        conn,
        "SELECT COUNT(*) FROM completion WHERE status = ?1",
        params![status.as_str()],
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn notice(id: &str) -> Notice {
        Notice {
            id: id.to_string(),
            title: format!("Notice {id}"),
            organization: "Water Board".to_string(),
            category: "Services".to_string(),
            method: Some("Open".to_string()),
            due_date: Some("2024-03-01".to_string()),
            announce_date: None,
            budget: "5000".to_string(),
            counterparty: None,
            detail_url: format!("https://example.test/?pbancNo={id}"),
            raw_payload: json!({"bidPbancNo": id}),
        }
    }

    #[test]
    fn test_save_marks_success() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.is_already_done("A1").unwrap());

        store.save(&notice("A1")).unwrap();

        assert!(store.is_already_done("A1").unwrap());
        assert_eq!(store.record_count().unwrap(), 1);
        assert_eq!(store.success_count().unwrap(), 1);
    }

    #[test]
    fn test_saving_twice_keeps_one_row_each() {
        let store = Store::open_in_memory().unwrap();
        store.save(&notice("A1")).unwrap();

        let mut updated = notice("A1");
        updated.title = "Amended".to_string();
        store.save(&updated).unwrap();

        let stats = store.get_stats().unwrap();
        assert_eq!(stats.total_records, 1);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_failure_never_overwrites_success() {
        let store = Store::open_in_memory().unwrap();
        store.save(&notice("A1")).unwrap();

        store.log_failure("A1", "late failure").unwrap();
        assert!(store.is_already_done("A1").unwrap());

        store.log_failure("B2", "first failure").unwrap();
        store.log_failure("B2", "second failure").unwrap();
        assert_eq!(store.failed_ids().unwrap(), vec!["B2".to_string()]);
    }

    #[test]
    fn test_success_replaces_failure() {
        let store = Store::open_in_memory().unwrap();
        store.log_failure("A1", "timeout").unwrap();
        store.save(&notice("A1")).unwrap();

        assert!(store.failed_ids().unwrap().is_empty());
        assert!(store.is_already_done("A1").unwrap());
    }

    #[test]
    fn test_failed_save_rolls_back_record() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON completion
                 WHEN NEW.status = 'SUCCESS' AND NEW.id = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store.save(&notice("boom")).unwrap_err();
        assert!(matches!(err, HarvestError::Storage(_)));

        assert_eq!(store.record_count().unwrap(), 0);
        assert!(!store.is_already_done("boom").unwrap());
        assert_eq!(store.failed_ids().unwrap(), vec!["boom".to_string()]);

        store.save(&notice("fine")).unwrap();
        assert_eq!(store.record_count().unwrap(), 1);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = Store::open_in_memory().unwrap();
        let id = store.start_session().unwrap();

        let running = store.session(id).unwrap().unwrap();
        assert_eq!(running.status, SessionStatus::Running);
        assert!(running.finished_at.is_none());
        assert_eq!(running.stats, RunStats::default());

        let stats = RunStats {
            found: 10,
            collected: 7,
            skipped: 2,
            errors: 1,
            pages_processed: 2,
            pages_failed: 1,
        };
        store.finish_session(id, &stats).unwrap();

        let done = store.session(id).unwrap().unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(done.finished_at.is_some());
        assert_eq!(done.stats, stats);

        assert!(store.session(id + 1).unwrap().is_none());
        assert!(store.finish_session(id + 1, &stats).is_err());
    }

    #[test]
    fn test_close_leaves_clones_usable() {
        let store = Store::open_in_memory().unwrap();
        let other = store.clone();

        store.close();

        other.save(&notice("C1")).unwrap();
        assert!(other.is_already_done("C1").unwrap());
        assert_eq!(Arc::strong_count(&other.db), 1);
    }

    #[test]
    fn test_open_creates_parent_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("tenders.db");

        let store = Store::open(&path).unwrap();
        store.save(&notice("A1")).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        store.close();

        let reopened = Store::open(&path).unwrap();
        assert!(reopened.is_already_done("A1").unwrap());
    }

    #[test]
    fn test_export_empty_store_writes_header_only_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        let store = Store::open_in_memory().unwrap();

        assert_eq!(store.export_all(ExportFormat::Csv, &path).unwrap(), 0);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_start_matches('\u{feff}').trim_end(), schema::RECORD_COLUMNS.join(","));
    }

    #[test]
    fn test_export_preserves_row_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all.json");
        let store = Store::open_in_memory().unwrap();
        for id in ["C3", "A1", "B2"] {
            store.save(&notice(id)).unwrap();
        }

        assert_eq!(store.export_all(ExportFormat::Json, &path).unwrap(), 3);

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let ids: Vec<&str> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["C3", "A1", "B2"]);
    }
}
