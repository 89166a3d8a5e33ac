//! LLM client abstraction.
//!
//! Provides a unified interface for different LLM providers. The cascade only
//! needs plain completions; decorators add circuit breaking
//! ([`ResilientLlmProvider`]) and concurrency limits ([`BulkheadLlmProvider`]).

mod anthropic;
mod bulkhead;
mod openai;
mod resilience;
mod system_prompt;

pub use anthropic::AnthropicClient;
pub use bulkhead::BulkheadLlmProvider;
pub use openai::OpenAiClient;
pub use resilience::{LlmResilienceConfig, ResilientLlmProvider};
pub use system_prompt::{
    EXPLAINER_SYSTEM_PROMPT, SOLVER_SYSTEM_PROMPT, explainer_user_prompt, solver_user_prompt,
};

use crate::Result;
use crate::config::{LlmConfig, LlmProvider as Provider, env_parse};
use std::sync::Arc;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    ///
    /// Default implementation concatenates system and user prompts.
    /// Providers should override this to use native system prompt support.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Loads HTTP configuration from config file settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(timeout_ms) = config.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = config.connect_timeout_ms {
            settings.connect_timeout_ms = connect_timeout_ms;
        }
        settings
    }

    /// Applies `QUANTIX_LLM_TIMEOUT_MS` and `QUANTIX_LLM_CONNECT_TIMEOUT_MS`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout_ms) = env_parse("QUANTIX_LLM_TIMEOUT_MS") {
            self.timeout_ms = timeout_ms;
        }
        if let Some(connect_timeout_ms) = env_parse("QUANTIX_LLM_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = connect_timeout_ms;
        }
        self
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Builds the configured provider wrapped in resilience and bulkhead layers.
///
/// Returns `None` when no provider is configured.
#[must_use]
pub fn build_llm_provider(config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    let http = LlmHttpConfig::from_config(config).with_env_overrides();
    let resilience = LlmResilienceConfig::from_config(config).with_env_overrides();
    let bulkhead = crate::bulkhead::BulkheadConfig::default()
        .with_max_concurrent(config.max_concurrent.unwrap_or(4))
        .with_env_overrides("QUANTIX_LLM");

    let client: Box<dyn LlmProvider> = match config.provider {
        Provider::None => {
            tracing::debug!("No LLM provider configured");
            return None;
        },
        Provider::Anthropic => {
            let mut client = AnthropicClient::new().with_http_config(http);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(max_tokens) = config.max_tokens {
                client = client.with_max_tokens(max_tokens);
            }
            Box::new(client)
        },
        Provider::OpenAi | Provider::Ollama | Provider::LmStudio => {
            let mut client = match config.provider {
                Provider::Ollama => OpenAiClient::ollama(),
                Provider::LmStudio => OpenAiClient::lmstudio(),
                _ => OpenAiClient::new(),
            }
            .with_http_config(http);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key);
            }
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            if let Some(url) = &config.base_url {
                client = client.with_endpoint(url);
            }
            if let Some(max_tokens) = config.max_tokens {
                client = client.with_max_tokens(max_tokens);
            }
            Box::new(client)
        },
    };

    tracing::debug!(provider = client.name(), "LLM provider built");
    Some(Arc::new(BulkheadLlmProvider::new(
        ResilientLlmProvider::new(client, resilience),
        bulkhead,
    )))
}

impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        (**self).complete(prompt)
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        (**self).complete_with_system(system, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_from_config() {
        let config = LlmConfig {
            timeout_ms: Some(5_000),
            ..LlmConfig::default()
        };
        let http = LlmHttpConfig::from_config(&config);
        assert_eq!(http.timeout_ms, 5_000);
        assert_eq!(http.connect_timeout_ms, 3_000);
    }

    #[test]
    fn test_no_provider_builds_nothing() {
        assert!(build_llm_provider(&LlmConfig::default()).is_none());
    }

    #[test]
    fn test_provider_stack_keeps_name() {
        let config = LlmConfig {
            provider: Provider::Ollama,
            ..LlmConfig::default()
        };
        let provider = build_llm_provider(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
