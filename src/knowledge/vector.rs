//! Brute-force vector knowledge base.

use super::KnowledgeRetriever;
use super::ingest::{IngestStats, ingest_dir, question_text};
use crate::embedding::{Embedder, cosine_similarity};
use crate::models::{KbChunk, ScoredChunk};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::instrument;

/// A chunk with the embedding of its question text.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    chunk: KbChunk,
    embedding: Vec<f32>,
}

/// On-disk index layout.
#[derive(Serialize, Deserialize)]
struct IndexData {
    dimensions: usize,
    chunks: Vec<IndexedChunk>,
}

/// Knowledge base ranking every chunk by cosine similarity to the query.
///
/// Chunks scoring under `min_score` are never returned, so a question with
/// no related material is a miss instead of a wrong answer.
pub struct VectorKnowledgeBase {
    embedder: Arc<dyn Embedder>,
    chunks: RwLock<Vec<IndexedChunk>>,
    min_score: f32,
}

impl VectorKnowledgeBase {
    /// Creates an empty knowledge base.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            chunks: RwLock::new(Vec::new()),
            min_score: crate::config::DEFAULT_KB_MIN_SCORE,
        }
    }

    /// Sets the relevance floor.
    #[must_use]
    pub const fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embeds and indexes chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding fails; nothing is indexed in that case.
    pub fn add_chunks(&self, chunks: Vec<KbChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let questions: Vec<String> = chunks.iter().map(question_text).collect();
        let refs: Vec<&str> = questions.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed_batch(&refs)?;

        let added = chunks.len();
        let mut index = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        index.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedChunk { chunk, embedding }),
        );
        Ok(added)
    }

    /// Ingests every markdown file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read, yields no
    /// answerable chunk, or embedding fails.
    #[instrument(skip(self), fields(operation = "knowledge_ingest", dir = %dir.display()))]
    pub fn ingest_dir(&self, dir: &Path) -> Result<IngestStats> {
        let (chunks, stats) = ingest_dir(dir)?;
        if chunks.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no answerable chunks found in {}",
                dir.display()
            )));
        }
        self.add_chunks(chunks)?;
        Ok(stats)
    }

    /// Loads a saved index. A missing file yields an empty knowledge base.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or was built
    /// with embeddings of a different size.
    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let kb = Self::new(embedder);
        if !path.exists() {
            return Ok(kb);
        }

        let content = fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "load_knowledge_index".to_string(),
            cause: e.to_string(),
        })?;
        let data: IndexData = serde_json::from_str(&content).map_err(|e| Error::OperationFailed {
            operation: "parse_knowledge_index".to_string(),
            cause: e.to_string(),
        })?;

        if data.dimensions != kb.embedder.dimensions() {
            return Err(Error::InvalidInput(format!(
                "Knowledge index dimensions mismatch: expected {}, got {}; re-run ingest",
                kb.embedder.dimensions(),
                data.dimensions
            )));
        }

        *kb.chunks.write().unwrap_or_else(PoisonError::into_inner) = data.chunks;
        tracing::debug!(path = %path.display(), chunks = kb.len(), "Knowledge index loaded");
        Ok(kb)
    }

    /// Writes the index to `path`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = IndexData {
            dimensions: self.embedder.dimensions(),
            chunks: self.chunks.read().unwrap_or_else(PoisonError::into_inner).clone(),
        };
        let content = serde_json::to_string(&data).map_err(|e| Error::OperationFailed {
            operation: "serialize_knowledge_index".to_string(),
            cause: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_knowledge_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| Error::OperationFailed {
            operation: "write_knowledge_index".to_string(),
            cause: e.to_string(),
        })?;
        fs::rename(&tmp, path).map_err(|e| Error::OperationFailed {
            operation: "write_knowledge_index".to_string(),
            cause: e.to_string(),
        })
    }
}

impl KnowledgeRetriever for VectorKnowledgeBase {
    #[instrument(skip(self, query), fields(operation = "knowledge_retrieve"))]
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let start = Instant::now();
        let index = self.chunks.read().unwrap_or_else(PoisonError::into_inner);
        if index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query)?;
        let mut scored: Vec<ScoredChunk> = index
            .iter()
            .map(|indexed| ScoredChunk {
                score: cosine_similarity(&query_embedding, &indexed.embedding),
                chunk: indexed.chunk.clone(),
            })
            .filter(|scored| scored.score >= self.min_score)
            .collect();
        drop(index);

        // Stable sort keeps ingestion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        let outcome = if scored.is_empty() { "miss" } else { "hit" };
        metrics::counter!("knowledge_retrievals_total", "outcome" => outcome).increment(1);
        metrics::histogram!("knowledge_retrieve_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(results = scored.len(), "Knowledge retrieval complete");
        Ok(scored)
    }
}
