//! LLM resilience wrapper with retries and circuit breaking.
//!
//! Timed-out calls are retried up to `max_retries` times. After
//! `breaker_failure_threshold` consecutive failures the circuit opens and
//! calls fail immediately until `breaker_reset_timeout_ms` has passed; then a
//! single trial call decides whether it closes again.

use super::LlmProvider;
use crate::config::{LlmConfig, env_parse};
use crate::{Error, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Resilience configuration for LLM calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResilienceConfig {
    /// Maximum number of retries for timed-out calls.
    pub max_retries: u32,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff_ms: 100,
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl LlmResilienceConfig {
    /// Loads resilience configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads resilience configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(max_retries) = config.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(retry_backoff_ms) = config.retry_backoff_ms {
            settings.retry_backoff_ms = retry_backoff_ms;
        }
        if let Some(threshold) = config.breaker_failure_threshold {
            settings.breaker_failure_threshold = threshold.max(1);
        }
        if let Some(reset_ms) = config.breaker_reset_ms {
            settings.breaker_reset_timeout_ms = reset_ms;
        }
        settings
    }

    /// Applies `QUANTIX_LLM_*` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(parsed) = env_parse("QUANTIX_LLM_MAX_RETRIES") {
            self.max_retries = parsed;
        }
        if let Some(parsed) = env_parse("QUANTIX_LLM_RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parsed;
        }
        if let Some(parsed) = env_parse::<u32>("QUANTIX_LLM_BREAKER_FAILURE_THRESHOLD") {
            self.breaker_failure_threshold = parsed.max(1);
        }
        if let Some(parsed) = env_parse("QUANTIX_LLM_BREAKER_RESET_MS") {
            self.breaker_reset_timeout_ms = parsed;
        }
        if let Some(parsed) = env_parse::<u32>("QUANTIX_LLM_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.breaker_half_open_max_calls = parsed.max(1);
        }
        self
    }
}

/// Circuit breaker state machine.
#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &LlmResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Returns true when this failure opened the circuit.
    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// LLM provider wrapper with retries and a circuit breaker.
pub struct ResilientLlmProvider<P: LlmProvider> {
    inner: P,
    config: LlmResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientLlmProvider<P> {
    /// Creates a new resilient LLM provider wrapper.
    #[must_use]
    pub fn new(inner: P, config: LlmResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    fn lock_breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn execute<F>(&self, operation: &'static str, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String>,
    {
        let provider = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider,
            operation,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let allowed = {
            let mut breaker = self.lock_breaker();
            let allowed = breaker.allow();
            record_breaker_state(provider, breaker.state_value());
            allowed
        };
        if !allowed {
            span.record("status", "circuit_open");
            record_request(provider, operation, "circuit_open", Duration::ZERO);
            return Err(Error::Upstream {
                service: provider.to_string(),
                cause: "circuit breaker open".to_string(),
            });
        }

        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let start = Instant::now();
            let result = call();
            let elapsed = start.elapsed();

            let err = match result {
                Ok(value) => {
                    record_request(provider, operation, "success", elapsed);
                    let mut breaker = self.lock_breaker();
                    breaker.on_success();
                    record_breaker_state(provider, breaker.state_value());
                    span.record("status", "success");
                    return Ok(value);
                },
                Err(err) => err,
            };

            let is_timeout = is_timeout_error(&err);
            let status = if is_timeout { "timeout" } else { "error" };
            record_request(provider, operation, status, elapsed);
            span.record("status", status);

            let tripped = {
                let mut breaker = self.lock_breaker();
                let tripped = breaker.on_failure();
                record_breaker_state(provider, breaker.state_value());
                tripped
            };
            if tripped {
                metrics::counter!("llm_circuit_breaker_trips_total", "provider" => provider)
                    .increment(1);
                tracing::warn!(provider, operation, "LLM circuit breaker opened");
                return Err(err);
            }

            if !is_timeout || attempt >= max_attempts {
                return Err(err);
            }
            metrics::counter!("llm_retries_total", "provider" => provider, "operation" => operation)
                .increment(1);
            tracing::warn!(provider, operation, attempt, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "Retrying LLM call");
            if self.config.retry_backoff_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
            }
        }
    }
}

impl<P: LlmProvider> LlmProvider for ResilientLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.execute("complete", || self.inner.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.execute("complete_with_system", || {
            self.inner.complete_with_system(system, user)
        })
    }
}

fn record_request(provider: &'static str, operation: &'static str, status: &'static str, elapsed: Duration) {
    metrics::counter!(
        "llm_requests_total",
        "provider" => provider,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "llm_request_duration_ms",
        "provider" => provider,
        "status" => status
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

fn record_breaker_state(provider: &'static str, state: u8) {
    metrics::gauge!("llm_circuit_breaker_state", "provider" => provider).set(f64::from(state));
}

fn is_timeout_error(err: &Error) -> bool {
    match err {
        Error::OperationFailed { cause, .. } | Error::Upstream { cause, .. } => {
            let lower = cause.to_lowercase();
            lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline")
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        fail_first: u32,
        cause: &'static str,
    }

    impl Flaky {
        fn new(fail_first: u32, cause: &'static str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
                cause,
            }
        }
    }

    impl LlmProvider for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(Error::upstream("flaky", self.cause))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn config() -> LlmResilienceConfig {
        LlmResilienceConfig {
            retry_backoff_ms: 0,
            ..LlmResilienceConfig::default()
        }
    }

    #[test]
    fn test_retries_timeout_once() {
        let provider = ResilientLlmProvider::new(Flaky::new(1, "request timed out"), config());
        assert_eq!(provider.complete("p").unwrap(), "ok");
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_does_not_retry_other_errors() {
        let provider = ResilientLlmProvider::new(Flaky::new(1, "401 unauthorized"), config());
        assert!(provider.complete("p").is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let provider = ResilientLlmProvider::new(Flaky::new(10, "timeout"), config());
        assert!(provider.complete("p").is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let provider = ResilientLlmProvider::new(
            Flaky::new(100, "connection refused"),
            LlmResilienceConfig {
                breaker_failure_threshold: 2,
                breaker_reset_timeout_ms: 60_000,
                ..config()
            },
        );
        assert!(provider.complete("p").is_err());
        assert!(provider.complete("p").is_err());
        let err = provider.complete("p").unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_breaker_half_opens_after_reset() {
        let provider = ResilientLlmProvider::new(
            Flaky::new(1, "connection refused"),
            LlmResilienceConfig {
                breaker_failure_threshold: 1,
                breaker_reset_timeout_ms: 0,
                ..config()
            },
        );
        assert!(provider.complete("p").is_err());
        assert_eq!(provider.complete("p").unwrap(), "ok");
        assert_eq!(provider.complete("p").unwrap(), "ok");
    }
}
