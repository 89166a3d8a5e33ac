//! `OpenAI` client.
//!
//! Also speaks to any OpenAI-compatible chat completions endpoint, which
//! covers Ollama and LM Studio.

use super::{LlmHttpConfig, LlmProvider, build_http_client};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    /// Provider label for logs and metrics.
    name: &'static str,
    /// API key. Local servers accept requests without one.
    api_key: Option<String>,
    /// Whether a missing key is an error.
    requires_key: bool,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// Completion token limit.
    max_tokens: u32,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Default Ollama endpoint.
    pub const OLLAMA_ENDPOINT: &'static str = "http://localhost:11434/v1";

    /// Default LM Studio endpoint.
    pub const LMSTUDIO_ENDPOINT: &'static str = "http://localhost:1234/v1";

    /// Default completion token limit.
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;

    /// Creates a new `OpenAI` client reading `OPENAI_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "openai",
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            requires_key: true,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            client: build_http_client(LlmHttpConfig::from_env()),
        }
    }

    /// Creates a client for a local Ollama server.
    #[must_use]
    pub fn ollama() -> Self {
        Self {
            name: "ollama",
            api_key: None,
            requires_key: false,
            endpoint: std::env::var("OLLAMA_HOST")
                .map_or_else(|_| Self::OLLAMA_ENDPOINT.to_string(), |host| format!("{host}/v1")),
            model: "llama3.2".to_string(),
            ..Self::new()
        }
    }

    /// Creates a client for a local LM Studio server.
    #[must_use]
    pub fn lmstudio() -> Self {
        Self {
            name: "lmstudio",
            api_key: None,
            requires_key: false,
            endpoint: Self::LMSTUDIO_ENDPOINT.to_string(),
            model: "local-model".to_string(),
            ..Self::new()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the completion token limit.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets HTTP client timeouts for LLM requests.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Validates that the client is configured.
    fn validate(&self) -> Result<()> {
        if self.requires_key && self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(Error::OperationFailed {
                operation: "openai_request".to_string(),
                cause: "OPENAI_API_KEY not set".to_string(),
            });
        }
        Ok(())
    }

    /// Checks if the model is a reasoning model.
    ///
    /// These use `max_completion_tokens` instead of `max_tokens` and only
    /// support the default temperature.
    fn is_reasoning_model(&self) -> bool {
        self.model.starts_with("gpt-5") || self.model.starts_with("o1") || self.model.starts_with("o3")
    }

    /// Makes a request to the chat completions API.
    fn request(&self, messages: Vec<ChatMessage>) -> Result<String> {
        self.validate()?;

        let request = if self.is_reasoning_model() {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: None,
                max_completion_tokens: Some(self.max_tokens),
                temperature: None,
            }
        } else {
            ChatCompletionRequest {
                model: self.model.clone(),
                messages,
                max_tokens: Some(self.max_tokens),
                max_completion_tokens: None,
                temperature: Some(0.0),
            }
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().map_err(|e| {
            let error_kind = if e.is_timeout() { "timeout" } else if e.is_connect() { "connect" } else { "request" };
            tracing::error!(provider = self.name, model = %self.model, error = %e, error_kind, "LLM request failed");
            Error::Upstream {
                service: self.name.to_string(),
                cause: format!("{error_kind} error: {e}"),
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Upstream {
                service: self.name.to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let response: ChatCompletionResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "openai_response".to_string(),
            cause: e.to_string(),
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::OperationFailed {
                operation: "openai_response".to_string(),
                cause: "No choices in response".to_string(),
            })
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        self.name
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(vec![ChatMessage::user(prompt)])
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(system.to_string()),
            },
            ChatMessage::user(user),
        ])
    }
}

/// Request to the Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// A message in the chat.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
        }
    }
}

/// Response from the Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
