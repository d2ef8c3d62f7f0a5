use std::path::Path;

use anyhow::Result;
use rusqlite::{params, Connection};

use super::{DetectionRecord, LogSink};
use crate::error::SinkError;

/// Detection log in a local SQLite database (WAL mode).
pub struct SqliteLogSink {
    conn: Connection,
}

impl SqliteLogSink {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut sink = Self { conn };
        sink.ensure_schema()?;
        Ok(sink)
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut sink = Self {
            conn: Connection::open_in_memory()?,
        };
        sink.ensure_schema()?;
        Ok(sink)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS detections (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              detected_at TEXT NOT NULL,
              class_name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_detections_at ON detections(detected_at);
            "#,
        )?;
        Ok(())
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<DetectionRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT detected_at, class_name FROM detections ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(DetectionRecord {
                timestamp: row.get(0)?,
                class_name: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }
}

impl LogSink for SqliteLogSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn append(&mut self, record: &DetectionRecord) -> Result<(), SinkError> {
        self.conn
            .execute(
                "INSERT INTO detections(detected_at, class_name) VALUES (?1, ?2)",
                params![record.timestamp, record.class_name],
            )
            .map(|_| ())
            .map_err(|err| SinkError::log("sqlite", err))
    }
}
