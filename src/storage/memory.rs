//! In-memory memo store.

use super::MemoStore;
use crate::{Error, Result};
use crate::models::MemoEntry;
use std::sync::{PoisonError, RwLock};

/// Memo store that lives only as long as the process.
#[derive(Default)]
pub struct InMemoryMemoStore {
    entries: RwLock<Vec<MemoEntry>>,
}

impl InMemoryMemoStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoStore for InMemoryMemoStore {
    fn load(&self) -> Result<Vec<MemoEntry>> {
        Ok(self.entries.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn append(&self, entry: &MemoEntry) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(Error::InvalidInput(format!("memo entry {} already exists", entry.id)));
        }
        entries.push(entry.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feedback;
    use crate::storage::tests::entry;

    #[test]
    fn test_append_keeps_order_and_rejects_duplicates() {
        let store = InMemoryMemoStore::new();
        let first = entry("derivative of x^2", Feedback::Correct, None);
        store.append(&first).unwrap();
        store.append(&entry("gradient of x*y", Feedback::Correct, None)).unwrap();

        assert!(store.append(&first).is_err());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].problem_text, "derivative of x^2");
    }
}
