//! Persistence tests for the memo store backends.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use quantix::config::{MemoBackend, MemoConfig};
use quantix::embedding::FastEmbedEmbedder;
use quantix::models::{Feedback, FeedbackRequest, MemoEntry, ResolvedAnswer, Topic};
use quantix::storage::open_memo_store;
use quantix::{MemoStore, SemanticMemoCache};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;

fn entry(id: &str, problem: &str) -> MemoEntry {
    MemoEntry {
        id: id.to_string(),
        created_at: 1_700_000_000,
        embedding: vec![0.5, -0.25, 1.0],
        problem_text: problem.to_string(),
        topic: Topic::Calculus,
        solution_steps: vec!["d/dx x^2 = 2x".to_string()],
        final_answer: ResolvedAnswer::new("2*x", "2 x"),
        feedback: Feedback::Correct,
        correction: None,
    }
}

fn open(backend: MemoBackend, path: &Path) -> Arc<dyn MemoStore> {
    let config = MemoConfig {
        backend,
        ..MemoConfig::default()
    };
    open_memo_store(&config, path).unwrap()
}

#[test_case(MemoBackend::Sqlite, "memo.db" ; "sqlite")]
#[test_case(MemoBackend::File, "memo.json" ; "file")]
fn test_entries_survive_reopen(backend: MemoBackend, file_name: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(file_name);

    {
        let store = open(backend, &path);
        store.append(&entry("a", "derivative of x^2")).unwrap();
        store.append(&entry("b", "gradient of x*y")).unwrap();
    }

    let reopened = open(backend, &path);
    let loaded = reopened.load().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], entry("a", "derivative of x^2"));
    assert_eq!(loaded[1].id, "b");
}

#[test_case(MemoBackend::Sqlite, "memo.db" ; "sqlite")]
#[test_case(MemoBackend::File, "memo.json" ; "file")]
#[test_case(MemoBackend::Memory, "unused" ; "memory")]
fn test_duplicate_id_is_rejected(backend: MemoBackend, file_name: &str) {
    let dir = TempDir::new().unwrap();
    let store = open(backend, &dir.path().join(file_name));

    store.append(&entry("a", "derivative of x^2")).unwrap();
    assert!(store.append(&entry("a", "something else")).is_err());
    assert_eq!(store.load().unwrap().len(), 1);
}

#[test_case(MemoBackend::Sqlite, "memo.db" ; "sqlite")]
#[test_case(MemoBackend::File, "memo.json" ; "file")]
fn test_missing_store_loads_empty(backend: MemoBackend, file_name: &str) {
    let dir = TempDir::new().unwrap();
    let store = open(backend, &dir.path().join("nested").join(file_name));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn test_feedback_is_reused_by_a_new_cache() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("memo.db");
    let embedder = Arc::new(FastEmbedEmbedder::new());

    let cache = SemanticMemoCache::new(open(MemoBackend::Sqlite, &path), embedder.clone());
    cache
        .record(FeedbackRequest {
            problem_text: "hessian of x^2*y + y^3".to_string(),
            topic: None,
            final_answer: ResolvedAnswer::plain("[[2*y, 2*x], [2*x, 6*y]]"),
            solution_steps: Vec::new(),
            feedback: Feedback::Correct,
            correction: None,
        })
        .unwrap();
    drop(cache);

    let cache = SemanticMemoCache::new(open(MemoBackend::Sqlite, &path), embedder);
    let hit = cache.lookup("Hessian of x^2*y + y^3").unwrap().unwrap();
    assert_eq!(hit.answer.text, "[[2*y, 2*x], [2*x, 6*y]]");
    assert_eq!(hit.entry.topic, Topic::Calculus);
}
