//! Knowledge-base chunks.

use serde::{Deserialize, Serialize};

/// A curated piece of knowledge with an extractable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbChunk {
    /// Full chunk text.
    pub content: String,
    /// The answer the chunk provides.
    pub answer: String,
    /// Optional explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Originating document.
    pub source: String,
}

/// A chunk with its retrieval score, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The chunk.
    pub chunk: KbChunk,
    /// Similarity in `[-1, 1]`.
    pub score: f32,
}
