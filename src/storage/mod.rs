//! Memo persistence.
//!
//! The memo cache is append-only: entries are written once and read back in
//! insertion order. Three backends are available:
//! - **`SQLite`** (default): one row per entry, WAL mode
//! - **File**: a single JSON array
//! - **Memory**: process lifetime only

// Allow significant_drop_tightening - dropping connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

mod filesystem;
mod memory;
pub mod sqlite;

pub use filesystem::FileMemoStore;
pub use memory::InMemoryMemoStore;
pub use sqlite::SqliteMemoStore;

use crate::Result;
use crate::config::{MemoBackend, MemoConfig};
use crate::models::MemoEntry;
use std::path::Path;
use std::sync::Arc;

/// Append-only store of memo entries.
pub trait MemoStore: Send + Sync {
    /// Loads every entry in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self) -> Result<Vec<MemoEntry>>;

    /// Appends one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted or its id is taken.
    fn append(&self, entry: &MemoEntry) -> Result<()>;

    /// Backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Opens the memo store selected by `config`, rooted at `path`.
///
/// # Errors
///
/// Returns an error if the `SQLite` database cannot be opened.
pub fn open_memo_store(config: &MemoConfig, path: &Path) -> Result<Arc<dyn MemoStore>> {
    let store: Arc<dyn MemoStore> = match config.backend {
        MemoBackend::Sqlite => Arc::new(SqliteMemoStore::new(path)?),
        MemoBackend::File => Arc::new(FileMemoStore::new(path)),
        MemoBackend::Memory => Arc::new(InMemoryMemoStore::new()),
    };
    tracing::debug!(backend = store.backend_name(), path = %path.display(), "Memo store opened");
    Ok(store)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Feedback, ResolvedAnswer, Topic};
    use tempfile::TempDir;

    pub(crate) fn entry(problem: &str, feedback: Feedback, correction: Option<&str>) -> MemoEntry {
        MemoEntry {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: crate::current_timestamp(),
            embedding: vec![1.0, 0.5, -0.25],
            problem_text: problem.to_string(),
            topic: Topic::Calculus,
            solution_steps: vec!["step".to_string()],
            final_answer: ResolvedAnswer::plain("2*x"),
            feedback,
            correction: correction.map(ToString::to_string),
        }
    }

    #[test]
    fn test_in_memory_store_keeps_order() {
        let store = InMemoryMemoStore::new();
        assert!(store.is_empty());
        store.append(&entry("a", Feedback::Correct, None)).unwrap();
        store.append(&entry("b", Feedback::Correct, None)).unwrap();
        let problems: Vec<_> = store.load().unwrap().into_iter().map(|e| e.problem_text).collect();
        assert_eq!(problems, vec!["a", "b"]);
    }

    #[test]
    fn test_open_memo_store_by_backend() {
        let dir = TempDir::new().unwrap();
        for (backend, name) in [
            (MemoBackend::Sqlite, "sqlite"),
            (MemoBackend::File, "file"),
            (MemoBackend::Memory, "memory"),
        ] {
            let config = MemoConfig {
                backend,
                ..MemoConfig::default()
            };
            let store = open_memo_store(&config, &dir.path().join(name)).unwrap();
            assert_eq!(store.backend_name(), name);
        }
    }
}
