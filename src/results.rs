//! Append-only storage for evaluation results.
//!
//! Schema:
//!   results(
//!     student_id TEXT,
//!     score      INTEGER
//!   )

use std::path::Path;
use std::time::Duration;

use log::debug;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::types::StudentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub student_id: StudentId,
    pub score: u32,
}

/// Failure reported by a [`ResultSink`]. Sinks are free to use whatever
/// storage they like, so the cause is boxed.
pub type ResultSinkError = Box<dyn std::error::Error + Send + Sync>;

/// Somewhere finished evaluations are recorded. Records are only ever
/// appended, and implementations must keep concurrent appends isolated.
pub trait ResultSink {
    fn append(&mut self, record: &ResultRecord) -> Result<(), ResultSinkError>;
}

/// A [`ResultSink`] backed by a SQLite database.
pub struct SqliteResultSink {
    conn: Connection,
}

impl SqliteResultSink {
    pub const DEFAULT_PATH: &'static str = "results.db";

    /// Open (or create) the results database at `path`.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS results (
                student_id TEXT,
                score      INTEGER
            );",
        )?;
        debug!("results database opened");
        Ok(Self { conn })
    }

    /// All records in the order they were appended.
    pub fn records(&self) -> rusqlite::Result<Vec<ResultRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT student_id, score FROM results ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(ResultRecord {
                student_id: StudentId::from(row.get::<_, String>(0)?),
                score: row.get(1)?,
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl ResultSink for SqliteResultSink {
    fn append(&mut self, record: &ResultRecord) -> Result<(), ResultSinkError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO results (student_id, score) VALUES (?1, ?2)",
            params![record.student_id.as_str(), record.score],
        )?;
        tx.commit()?;
        debug!("recorded score {} for {}", record.score, record.student_id);
        Ok(())
    }
}
