//! Embedding generation.
//!
//! Question text is embedded for the memo cache and the knowledge base.
//! With the `fastembed-embeddings` feature the all-MiniLM-L6-v2 model is
//! used; otherwise a deterministic token-hash embedding stands in.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod bulkhead;
mod fastembed;

pub use bulkhead::BulkheadEmbedder;
pub use fastembed::FastEmbedEmbedder;

use crate::Result;

/// Embedding dimensions of all-MiniLM-L6-v2.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Maps question text to a fixed-length vector.
///
/// Vectors from one embedder are comparable with [`cosine_similarity`];
/// vectors from embedders of different dimensions never match.
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Embeds one question.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for blank text, and an error if
    /// the model is unavailable.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several questions, in order. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first embedding error.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns 0.0 when the vectors differ in length, are empty, or either has
/// zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a_sq, norm_b_sq) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (x.mul_add(*y, dot), x.mul_add(*x, na), y.mul_add(*y, nb))
        });
    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return 0.0;
    }

    dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt())
}
