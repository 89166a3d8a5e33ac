//! Bulkhead for LLM calls.
//!
//! Limits concurrent requests to one provider so a burst of unanswerable
//! sub-problems cannot exhaust the provider's rate limit.
//!
//! ```rust,ignore
//! use quantix::bulkhead::BulkheadConfig;
//! use quantix::llm::{AnthropicClient, BulkheadLlmProvider};
//!
//! let provider = BulkheadLlmProvider::new(AnthropicClient::new(), BulkheadConfig::from_env("QUANTIX_LLM"));
//! ```

use super::LlmProvider;
use crate::Result;
use crate::bulkhead::{Bulkhead, BulkheadConfig};

/// LLM provider wrapper with a concurrency limit.
pub struct BulkheadLlmProvider<P: LlmProvider> {
    inner: P,
    bulkhead: Bulkhead,
}

impl<P: LlmProvider> BulkheadLlmProvider<P> {
    /// Creates a new bulkhead-wrapped LLM provider.
    #[must_use]
    pub fn new(inner: P, config: BulkheadConfig) -> Self {
        Self {
            inner,
            bulkhead: Bulkhead::new("llm", config),
        }
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.bulkhead.available_permits()
    }
}

impl<P: LlmProvider> LlmProvider for BulkheadLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.bulkhead.execute(|| self.inner.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.bulkhead
            .execute(|| self.inner.complete_with_system(system, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    struct SlowLlm;

    impl LlmProvider for SlowLlm {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn complete(&self, prompt: &str) -> Result<String> {
            std::thread::sleep(Duration::from_millis(100));
            Ok(format!("echo: {prompt}"))
        }
    }

    #[test]
    fn test_passes_calls_through() {
        let provider = BulkheadLlmProvider::new(SlowLlm, BulkheadConfig::default());
        assert_eq!(provider.name(), "slow");
        assert_eq!(provider.complete("hi").unwrap(), "echo: hi");
        assert!(provider.complete_with_system("sys", "hi").unwrap().contains("sys"));
        assert_eq!(provider.available_permits(), 4);
    }

    #[test]
    fn test_fail_fast_when_full() {
        let provider = Arc::new(BulkheadLlmProvider::new(
            SlowLlm,
            BulkheadConfig::new().with_max_concurrent(1).with_fail_fast(true),
        ));
        let busy = Arc::clone(&provider);
        let handle = std::thread::spawn(move || busy.complete("first"));
        std::thread::sleep(Duration::from_millis(30));

        assert!(provider.complete("second").is_err());
        assert!(handle.join().unwrap().is_ok());
    }
}
