//! `SQLite`-backed memo store.

use super::{acquire_lock, configure_connection, record_operation_metrics};
use crate::models::{Feedback, MemoEntry, ResolvedAnswer, Topic};
use crate::storage::MemoStore;
use crate::{Error, Result};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

/// Memo store backed by a single `SQLite` table.
///
/// Rows are only ever inserted; `seq` preserves insertion order so the
/// oldest entry wins similarity ties. Embeddings are stored as
/// little-endian `f32` blobs.
pub struct SqliteMemoStore {
    /// Protected by a mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteMemoStore {
    /// Opens (creating if needed) the store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_memo_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memo_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                problem_text TEXT NOT NULL,
                topic TEXT NOT NULL,
                embedding BLOB NOT NULL,
                solution_steps TEXT NOT NULL,
                final_answer TEXT NOT NULL,
                final_latex TEXT NOT NULL DEFAULT '',
                feedback TEXT NOT NULL,
                correction TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_memo_entries_feedback ON memo_entries(feedback);",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_memo_table".to_string(),
            cause: e.to_string(),
        })
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Raw column values of one row, before validation.
struct MemoRow {
    id: String,
    created_at: i64,
    problem_text: String,
    topic: String,
    embedding: Vec<u8>,
    solution_steps: String,
    final_answer: String,
    final_latex: String,
    feedback: String,
    correction: Option<String>,
}

impl MemoRow {
    fn into_entry(self) -> Result<MemoEntry> {
        let feedback = Feedback::parse(&self.feedback).ok_or_else(|| Error::OperationFailed {
            operation: "decode_memo_row".to_string(),
            cause: format!("entry {} has unknown feedback '{}'", self.id, self.feedback),
        })?;
        let solution_steps: Vec<String> =
            serde_json::from_str(&self.solution_steps).map_err(|e| Error::OperationFailed {
                operation: "decode_memo_row".to_string(),
                cause: format!("entry {}: {e}", self.id),
            })?;

        Ok(MemoEntry {
            created_at: u64::try_from(self.created_at).unwrap_or_default(),
            embedding: decode_embedding(&self.embedding),
            problem_text: self.problem_text,
            topic: Topic::parse(&self.topic).unwrap_or_default(),
            solution_steps,
            final_answer: ResolvedAnswer {
                text: self.final_answer,
                latex: self.final_latex,
            },
            feedback,
            correction: self.correction,
            id: self.id,
        })
    }
}

impl MemoStore for SqliteMemoStore {
    #[instrument(skip(self), fields(operation = "memo_load", backend = "sqlite"))]
    fn load(&self) -> Result<Vec<MemoEntry>> {
        let start = Instant::now();
        let result = (|| -> Result<Vec<MemoEntry>> {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(
                    "SELECT id, created_at, problem_text, topic, embedding, solution_steps,
                            final_answer, final_latex, feedback, correction
                     FROM memo_entries ORDER BY seq",
                )
                .map_err(|e| Error::OperationFailed {
                    operation: "memo_load".to_string(),
                    cause: e.to_string(),
                })?;

            let rows = stmt
                .query_map([], |row| {
                    Ok(MemoRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                        problem_text: row.get(2)?,
                        topic: row.get(3)?,
                        embedding: row.get(4)?,
                        solution_steps: row.get(5)?,
                        final_answer: row.get(6)?,
                        final_latex: row.get(7)?,
                        feedback: row.get(8)?,
                        correction: row.get(9)?,
                    })
                })
                .map_err(|e| Error::OperationFailed {
                    operation: "memo_load".to_string(),
                    cause: e.to_string(),
                })?;

            let mut entries = Vec::new();
            for row in rows {
                let row = row.map_err(|e| Error::OperationFailed {
                    operation: "memo_load".to_string(),
                    cause: e.to_string(),
                })?;
                entries.push(row.into_entry()?);
            }
            Ok(entries)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "memo_load", start, status);
        result
    }

    #[instrument(skip(self, entry), fields(operation = "memo_append", backend = "sqlite", entry_id = %entry.id))]
    fn append(&self, entry: &MemoEntry) -> Result<()> {
        let start = Instant::now();
        let result = (|| -> Result<()> {
            let steps = serde_json::to_string(&entry.solution_steps).map_err(|e| {
                Error::OperationFailed {
                    operation: "memo_append".to_string(),
                    cause: e.to_string(),
                }
            })?;
            let created_at = i64::try_from(entry.created_at).unwrap_or(i64::MAX);

            let mut conn = acquire_lock(&self.conn);
            let tx = conn.transaction().map_err(|e| Error::OperationFailed {
                operation: "memo_append".to_string(),
                cause: e.to_string(),
            })?;
            tx.execute(
                "INSERT INTO memo_entries (id, created_at, problem_text, topic, embedding,
                     solution_steps, final_answer, final_latex, feedback, correction)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.id,
                    created_at,
                    entry.problem_text,
                    entry.topic.as_str(),
                    encode_embedding(&entry.embedding),
                    steps,
                    entry.final_answer.text,
                    entry.final_answer.latex,
                    entry.feedback.as_str(),
                    entry.correction,
                ],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "memo_append".to_string(),
                cause: e.to_string(),
            })?;
            tx.commit().map_err(|e| Error::OperationFailed {
                operation: "memo_append".to_string(),
                cause: e.to_string(),
            })
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", "memo_append", start, status);
        result
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
