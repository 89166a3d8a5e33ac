//! Bulkhead pattern for outbound collaborator calls.
//!
//! Caps how many calls to one collaborator (embedding model, LLM) may be in
//! flight at once. Callers are synchronous, so permits are taken from a tokio
//! [`Semaphore`] with `try_acquire_owned` and a short sleep between polls.
//!
//! ```rust,ignore
//! use quantix::bulkhead::{Bulkhead, BulkheadConfig};
//!
//! let bulkhead = Bulkhead::new("embedding", BulkheadConfig::from_env("QUANTIX_EMBEDDING"));
//! let vector = bulkhead.execute(|| embedder.embed("x^2"))?;
//! ```

use crate::config::env_parse;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Upper bound on waiting when no acquire timeout is configured.
const MAX_WAIT: Duration = Duration::from_secs(300);

/// Bulkhead limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadConfig {
    /// Maximum concurrent calls.
    pub max_concurrent: usize,
    /// Permit wait in milliseconds (0 = wait up to five minutes).
    pub acquire_timeout_ms: u64,
    /// Reject immediately when full.
    pub fail_fast: bool,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkheadConfig {
    /// Four permits, 30 second wait.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: 4,
            acquire_timeout_ms: 30_000,
            fail_fast: false,
        }
    }

    /// Defaults with overrides from `{prefix}_BULKHEAD_*` variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `{prefix}_BULKHEAD_MAX_CONCURRENT` | Max concurrent calls | 4 |
    /// | `{prefix}_BULKHEAD_ACQUIRE_TIMEOUT_MS` | Permit timeout | 30000 |
    /// | `{prefix}_BULKHEAD_FAIL_FAST` | Fail when full | false |
    #[must_use]
    pub fn from_env(prefix: &str) -> Self {
        Self::default().with_env_overrides(prefix)
    }

    /// Applies `{prefix}_BULKHEAD_*` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self, prefix: &str) -> Self {
        if let Some(max) = env_parse::<usize>(&format!("{prefix}_BULKHEAD_MAX_CONCURRENT")) {
            self.max_concurrent = max.max(1);
        }
        if let Some(timeout) = env_parse::<u64>(&format!("{prefix}_BULKHEAD_ACQUIRE_TIMEOUT_MS")) {
            self.acquire_timeout_ms = timeout;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_BULKHEAD_FAIL_FAST")) {
            self.fail_fast = v.eq_ignore_ascii_case("true") || v == "1";
        }
        self
    }

    /// Sets the maximum concurrent calls.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets whether to fail fast when the bulkhead is full.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// A named concurrency limit.
#[derive(Debug)]
pub struct Bulkhead {
    name: &'static str,
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    /// Creates a bulkhead; `name` labels its metrics.
    #[must_use]
    pub fn new(name: &'static str, config: BulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            name,
            config,
            semaphore,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Returns the number of free permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Runs `call` while holding a permit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] when no permit is available in time,
    /// or whatever `call` returns.
    pub fn execute<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let _permit = self.acquire()?;
        call()
    }

    #[allow(clippy::cast_precision_loss)]
    fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        metrics::gauge!("bulkhead_available_permits", "bulkhead" => self.name)
            .set(self.semaphore.available_permits() as f64);

        let timeout = match (self.config.fail_fast, self.config.acquire_timeout_ms) {
            (true, _) => Duration::ZERO,
            (false, 0) => MAX_WAIT,
            (false, ms) => Duration::from_millis(ms),
        };

        let start = Instant::now();
        loop {
            if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
                metrics::counter!("bulkhead_permits_acquired_total", "bulkhead" => self.name)
                    .increment(1);
                return Ok(permit);
            }
            if start.elapsed() >= timeout {
                let reason = if self.config.fail_fast { "full" } else { "timeout" };
                metrics::counter!(
                    "bulkhead_rejections_total",
                    "bulkhead" => self.name,
                    "reason" => reason
                )
                .increment(1);
                tracing::warn!(bulkhead = self.name, reason, "Bulkhead rejected call");
                return Err(Error::OperationFailed {
                    operation: format!("{}_bulkhead_acquire", self.name),
                    cause: format!(
                        "bulkhead {reason}: {} concurrent calls allowed",
                        self.config.max_concurrent.max(1)
                    ),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_execute_returns_call_result() {
        let bulkhead = Bulkhead::new("test", BulkheadConfig::default());
        assert_eq!(bulkhead.execute(|| Ok(7)).unwrap(), 7);
        assert!(bulkhead.execute::<(), _>(|| Err(Error::InvalidInput("x".into()))).is_err());
        assert_eq!(bulkhead.available_permits(), 4);
    }

    #[test]
    fn test_fail_fast_when_full() {
        let bulkhead = Bulkhead::new(
            "test",
            BulkheadConfig::new().with_max_concurrent(1).with_fail_fast(true),
        );
        let result = bulkhead.execute(|| bulkhead.execute(|| Ok(())));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_timeout_when_full() {
        let bulkhead = Bulkhead::new(
            "test",
            BulkheadConfig::new().with_max_concurrent(1).with_acquire_timeout_ms(20),
        );
        let result = bulkhead.execute(|| bulkhead.execute(|| Ok(())));
        assert!(result.is_err());
    }

    #[test]
    fn test_limits_concurrency() {
        let bulkhead = Arc::new(Bulkhead::new(
            "test",
            BulkheadConfig::new().with_max_concurrent(2).with_acquire_timeout_ms(5_000),
        ));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (bulkhead, active, peak, barrier) =
                    (bulkhead.clone(), active.clone(), peak.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    bulkhead
                        .execute(|| {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(20));
                            active.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
