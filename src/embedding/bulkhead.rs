//! Bulkhead for embedding operations.
//!
//! Embedding is CPU and memory heavy, so concurrent calls are capped.
//! Defaults to two permits; override with `QUANTIX_EMBEDDING_BULKHEAD_*`.

use super::Embedder;
use crate::Result;
use crate::bulkhead::{Bulkhead, BulkheadConfig};

/// Default permits for embedding work.
const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Embedder wrapper with a concurrency limit.
pub struct BulkheadEmbedder<E: Embedder> {
    inner: E,
    bulkhead: Bulkhead,
}

impl<E: Embedder> BulkheadEmbedder<E> {
    /// Creates a new bulkhead-wrapped embedder.
    #[must_use]
    pub fn new(inner: E, config: BulkheadConfig) -> Self {
        Self {
            inner,
            bulkhead: Bulkhead::new("embedding", config),
        }
    }

    /// Creates a wrapper configured from `QUANTIX_EMBEDDING_BULKHEAD_*`.
    #[must_use]
    pub fn from_env(inner: E) -> Self {
        let config = BulkheadConfig::new()
            .with_max_concurrent(DEFAULT_MAX_CONCURRENT)
            .with_env_overrides("QUANTIX_EMBEDDING");
        Self::new(inner, config)
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.bulkhead.available_permits()
    }
}

impl<E: Embedder> Embedder for BulkheadEmbedder<E> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.bulkhead.execute(|| self.inner.embed(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.bulkhead.execute(|| self.inner.embed_batch(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockEmbedder {
        delay_ms: u64,
        call_count: AtomicUsize,
    }

    impl MockEmbedder {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                call_count: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for MockEmbedder {
        fn dimensions(&self) -> usize {
            8
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.delay_ms));
            }
            Ok(vec![0.5; 8])
        }
    }

    #[test]
    fn test_delegates_to_inner() {
        let embedder = BulkheadEmbedder::new(MockEmbedder::new(0), BulkheadConfig::default());
        assert_eq!(embedder.dimensions(), 8);
        assert_eq!(embedder.embed_batch(&["a", "b"]).unwrap().len(), 2);
        assert_eq!(embedder.inner.call_count.load(Ordering::SeqCst), 2);
        assert_eq!(embedder.available_permits(), 4);
    }

    #[test]
    fn test_rejects_when_full_and_fail_fast() {
        let embedder = Arc::new(BulkheadEmbedder::new(
            MockEmbedder::new(150),
            BulkheadConfig::new().with_max_concurrent(1).with_fail_fast(true),
        ));
        let busy = Arc::clone(&embedder);
        let handle = std::thread::spawn(move || busy.embed("slow"));
        std::thread::sleep(Duration::from_millis(40));

        assert!(embedder.embed("second").is_err());
        assert!(handle.join().unwrap().is_ok());
        assert_eq!(embedder.available_permits(), 1);
    }
}
