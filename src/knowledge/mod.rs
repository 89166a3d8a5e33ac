//! Curated knowledge base.
//!
//! Markdown documents are chunked, each chunk carrying an answer, and
//! retrieved by embedding similarity.

pub mod ingest;
mod vector;

pub use ingest::IngestStats;
pub use vector::VectorKnowledgeBase;

use crate::Result;
use crate::models::ScoredChunk;

/// Source of curated answers.
pub trait KnowledgeRetriever: Send + Sync {
    /// Returns up to `top_k` chunks ordered best first. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or embedding service is unavailable.
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>>;
}
