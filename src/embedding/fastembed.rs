//! FastEmbed-based embedder.
//!
//! Provides semantic embeddings using the all-MiniLM-L6-v2 model via fastembed-rs.
//! When the `fastembed-embeddings` feature is enabled, this uses real ONNX-based
//! semantic embeddings. Otherwise, falls back to deterministic token-hash embeddings
//! that weight math tokens (numbers, variables, operators) above prose.

use super::{DEFAULT_DIMENSIONS, Embedder};
use crate::{Error, Result};

// ============================================================================
// Native FastEmbed Implementation (with feature)
// ============================================================================

#[cfg(feature = "fastembed-embeddings")]
mod native {
    use super::{DEFAULT_DIMENSIONS, Embedder, Error, Result};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::{Mutex, OnceLock, PoisonError};
    use std::time::Instant;

    /// `FastEmbed` embedder using all-MiniLM-L6-v2.
    ///
    /// The model is owned by the embedder and loaded on the first embed
    /// call, not at construction. Share one instance behind an `Arc` so the
    /// model loads once per process.
    pub struct FastEmbedEmbedder {
        model_name: &'static str,
        model: OnceLock<Mutex<fastembed::TextEmbedding>>,
    }

    impl FastEmbedEmbedder {
        /// Default embedding dimensions for all-MiniLM-L6-v2.
        pub const DEFAULT_DIMENSIONS: usize = DEFAULT_DIMENSIONS;

        /// Creates a new `FastEmbed` embedder.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                model_name: "all-MiniLM-L6-v2",
                model: OnceLock::new(),
            }
        }

        /// Gets or initializes the embedding model.
        ///
        /// The first call blocks while the ONNX model loads (and downloads,
        /// on a cold cache).
        fn model(&self) -> Result<&Mutex<fastembed::TextEmbedding>> {
            if let Some(model) = self.model.get() {
                return Ok(model);
            }

            tracing::info!(model = self.model_name, "Loading embedding model (first use)");
            let start = Instant::now();

            let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false);
            let model = fastembed::TextEmbedding::try_new(options)
                .map_err(|e| Error::operation("load_embedding_model", e))?;

            tracing::info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                model = self.model_name,
                "Embedding model loaded"
            );

            // Another thread may have won the race; either model is fine.
            let _ = self.model.set(Mutex::new(model));
            self.model
                .get()
                .ok_or_else(|| Error::operation("load_embedding_model", "model slot empty after load"))
        }

        /// Returns the model name.
        #[must_use]
        pub const fn model_name(&self) -> &'static str {
            self.model_name
        }

        fn run(&self, operation: &str, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            let model = self.model()?;
            let batch_size = texts.len();

            // ONNX runtime can panic on malformed input; surface it as an error.
            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut model = model.lock().unwrap_or_else(PoisonError::into_inner);
                model.embed(texts, None)
            }));

            result
                .map_err(|panic_info| {
                    let panic_msg = panic_info
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic_info.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        panic_message = %panic_msg,
                        batch_size,
                        "ONNX runtime panicked during embedding"
                    );
                    Error::OperationFailed {
                        operation: operation.to_string(),
                        cause: format!("ONNX runtime panic: {panic_msg}"),
                    }
                })?
                .map_err(|e| Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: e.to_string(),
                })
        }
    }

    impl Default for FastEmbedEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn dimensions(&self) -> usize {
            Self::DEFAULT_DIMENSIONS
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
            }

            self.run("embed", vec![text.to_string()])?
                .into_iter()
                .next()
                .ok_or_else(|| Error::OperationFailed {
                    operation: "embed".to_string(),
                    cause: "No embedding returned from model".to_string(),
                })
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            if texts.iter().any(|t| t.trim().is_empty()) {
                return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
            }

            self.run(
                "embed_batch",
                texts.iter().map(|s| (*s).to_string()).collect(),
            )
        }
    }
}

// ============================================================================
// Fallback Implementation (without feature)
// ============================================================================

#[cfg(not(feature = "fastembed-embeddings"))]
mod fallback {
    use super::{DEFAULT_DIMENSIONS, Embedder, Error, Result};

    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Upper bound on tokens considered per text.
    const MAX_TOKENS: usize = 1000;

    /// Weight of prose words and of adjacent-token bigrams.
    const WORD_WEIGHT: f32 = 1.0;

    /// Weight of numbers, single-letter variables and operators.
    const MATH_WEIGHT: f32 = 3.0;

    /// Characters kept as standalone operator tokens.
    const OPERATORS: &str = "+-*/^=()[]{}<>,";

    /// `FastEmbed` embedder using token-hash pseudo-embeddings.
    ///
    /// Identical questions (modulo case, spacing and trailing punctuation)
    /// embed identically, and questions differing only in a number or an
    /// exponent land well below the memo threshold. Paraphrases are not
    /// recognised; enable `fastembed-embeddings` for that.
    pub struct FastEmbedEmbedder {
        dimensions: usize,
    }

    impl FastEmbedEmbedder {
        /// Default embedding dimensions for all-MiniLM-L6-v2.
        pub const DEFAULT_DIMENSIONS: usize = DEFAULT_DIMENSIONS;

        /// Creates a new `FastEmbed` embedder.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                dimensions: Self::DEFAULT_DIMENSIONS,
            }
        }

        /// Creates a new embedder with custom dimensions.
        #[must_use]
        pub const fn with_dimensions(dimensions: usize) -> Self {
            Self { dimensions }
        }

        fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
            bytes.into_iter().fold(FNV_OFFSET, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            })
        }

        fn add(&self, embedding: &mut [f32], hash: u64, weight: f32) {
            let idx = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign * weight;
        }

        fn pseudo_embed(&self, text: &str) -> Vec<f32> {
            let mut embedding = vec![0.0f32; self.dimensions];
            let tokens: Vec<(String, f32)> = tokenize(text).take(MAX_TOKENS).collect();

            for (token, weight) in &tokens {
                self.add(&mut embedding, Self::fnv1a(token.bytes()), *weight);
            }
            for pair in tokens.windows(2) {
                let bytes = pair[0].0.bytes().chain(std::iter::once(0)).chain(pair[1].0.bytes());
                self.add(&mut embedding, Self::fnv1a(bytes), WORD_WEIGHT);
            }

            normalize(&mut embedding);
            embedding
        }
    }

    /// Splits text into lowercase word, number and operator tokens with
    /// their weights.
    fn tokenize(text: &str) -> impl Iterator<Item = (String, f32)> + '_ {
        let mut chars = text.chars().flat_map(char::to_lowercase).peekable();
        std::iter::from_fn(move || {
            loop {
                let c = chars.next()?;
                if c.is_ascii_digit() {
                    let mut number = String::from(c);
                    while let Some(&next) = chars.peek() {
                        if !(next.is_ascii_digit() || next == '.') {
                            break;
                        }
                        number.push(next);
                        chars.next();
                    }
                    let number = number.trim_end_matches('.').to_string();
                    return Some((number, MATH_WEIGHT));
                }
                if c.is_alphabetic() {
                    let mut word = String::from(c);
                    while let Some(&next) = chars.peek() {
                        if !next.is_alphabetic() {
                            break;
                        }
                        word.push(next);
                        chars.next();
                    }
                    let weight = if word.chars().count() == 1 { MATH_WEIGHT } else { WORD_WEIGHT };
                    return Some((word, weight));
                }
                if OPERATORS.contains(c) {
                    return Some((c.to_string(), MATH_WEIGHT));
                }
            }
        })
    }

    fn normalize(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }

    impl Default for FastEmbedEmbedder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.trim().is_empty() {
                return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
            }
            if self.dimensions == 0 {
                return Err(Error::OperationFailed {
                    operation: "embed".to_string(),
                    cause: "Embedder has zero dimensions".to_string(),
                });
            }

            tracing::trace!("Using token-hash embedding (fastembed-embeddings feature not enabled)");
            Ok(self.pseudo_embed(text))
        }
    }

}

// ============================================================================
// Public Re-exports
// ============================================================================

#[cfg(feature = "fastembed-embeddings")]
pub use native::FastEmbedEmbedder;

#[cfg(not(feature = "fastembed-embeddings"))]
pub use fallback::FastEmbedEmbedder;
