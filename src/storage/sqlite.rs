//! SQLite storage backend for reconciled runs

use super::traits::{OpenStore, RunMode, RunStore, RunSummary, StorageError, StorageResult, StoredRun};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed run store
///
/// One table, one row per run; record, provenance and report are stored as
/// JSON text. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                mode TEXT NOT NULL,
                record_json TEXT NOT NULL,
                provenance_json TEXT NOT NULL,
                report_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_created_at
                ON runs(created_at);
            "#,
        )?;
        Ok(())
    }

    fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| StorageError::DateParse(e.to_string()))?
            .with_timezone(&Utc))
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RunStore for SqliteStore {
    fn save_run(&self, run: &StoredRun) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO runs (id, created_at, mode, record_json, provenance_json, report_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                created_at = excluded.created_at,
                mode = excluded.mode,
                record_json = excluded.record_json,
                provenance_json = excluded.provenance_json,
                report_json = excluded.report_json
            "#,
            params![
                run.id,
                run.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                run.mode.as_str(),
                serde_json::to_string(&run.record)?,
                serde_json::to_string(&run.provenance)?,
                serde_json::to_string(&run.report)?,
            ],
        )?;
        Ok(())
    }

    fn load_run(&self, id: &str) -> StorageResult<Option<StoredRun>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String, String)> = conn
            .query_row(
                "SELECT created_at, mode, record_json, provenance_json, report_json
                 FROM runs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let Some((created_at, mode, record, provenance, report)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredRun {
            id: id.to_string(),
            created_at: Self::parse_time(&created_at)?,
            mode: mode.parse::<RunMode>()?,
            record: serde_json::from_str(&record)?,
            provenance: serde_json::from_str(&provenance)?,
            report: serde_json::from_str(&report)?,
        }))
    }

    fn list_runs(&self) -> StorageResult<Vec<RunSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, created_at, mode FROM runs ORDER BY created_at DESC, id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, created_at, mode)| -> StorageResult<RunSummary> {
                Ok(RunSummary {
                    id,
                    created_at: Self::parse_time(&created_at)?,
                    mode: mode.parse::<RunMode>()?,
                })
            })
            .collect()
    }

    fn delete_run(&self, id: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM runs WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
