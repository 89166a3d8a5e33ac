//! JSON file memo store.
//!
//! The whole memo is one JSON array. Appends rewrite the file through a
//! uniquely named temporary sibling and a rename, so a crash never leaves a
//! torn file. Each read-modify-write cycle holds an advisory lock on a
//! `<name>.lock` sibling, which serializes writers across processes.

use super::MemoStore;
use super::sqlite::{acquire_lock, record_operation_metrics};
use crate::models::MemoEntry;
use crate::{Error, Result};
use fd_lock::RwLock;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Maximum memo file size (64MB).
const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Memo store persisted as a JSON array on disk.
pub struct FileMemoStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileMemoStore {
    /// Creates a store at `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Vec<MemoEntry>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::operation("read_memo_file", e)),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::OperationFailed {
                operation: "read_memo_file".to_string(),
                cause: format!(
                    "{} is {} bytes, over the {MAX_FILE_SIZE} byte limit",
                    self.path.display(),
                    metadata.len()
                ),
            });
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| Error::operation("read_memo_file", e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_memo_file".to_string(),
            cause: format!("{}: {e}", self.path.display()),
        })
    }

    /// Sibling path with `suffix` appended to the file name.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(ToOwned::to_owned).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn open_lock_file(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::operation("create_memo_dir", e))?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sibling(".lock"))
            .map_err(|e| Error::operation("open_memo_lock", e))
    }

    fn write_entries(&self, entries: &[MemoEntry]) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).map_err(|e| Error::operation("serialize_memo", e))?;

        let tmp = self.sibling(&format!(".{}.tmp", Uuid::now_v7().simple()));
        if let Err(e) = fs::write(&tmp, json) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::operation("write_memo_file", e));
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::operation("rename_memo_file", e)
        })
    }
}

impl MemoStore for FileMemoStore {
    #[instrument(skip(self), fields(operation = "memo_load", backend = "file"))]
    fn load(&self) -> Result<Vec<MemoEntry>> {
        let start = Instant::now();
        let result = self.read_entries();
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("file", "memo_load", start, status);
        result
    }

    #[instrument(skip(self, entry), fields(operation = "memo_append", backend = "file", entry_id = %entry.id))]
    fn append(&self, entry: &MemoEntry) -> Result<()> {
        let start = Instant::now();
        let result = (|| -> Result<()> {
            let _guard = acquire_lock(&self.write_lock);
            let mut file_lock = RwLock::new(self.open_lock_file()?);
            let _exclusive = file_lock.write().map_err(|e| Error::operation("lock_memo_file", e))?;
            let mut entries = self.read_entries()?;
            if entries.iter().any(|existing| existing.id == entry.id) {
                return Err(Error::InvalidInput(format!("memo entry {} already exists", entry.id)));
            }
            entries.push(entry.clone());
            self.write_entries(&entries)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("file", "memo_append", start, status);
        result
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
