//! Anthropic Claude client.

use super::{LlmHttpConfig, LlmProvider, build_http_client};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Anthropic Claude LLM client.
pub struct AnthropicClient {
    /// API key.
    api_key: Option<String>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// Completion token limit.
    max_tokens: u32,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl AnthropicClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-3-haiku-20240307";

    /// Creates a new Anthropic client reading `ANTHROPIC_API_KEY`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            client: build_http_client(LlmHttpConfig::from_env()),
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

    /// Validates that the client is configured with a plausible API key.
    fn validate(&self) -> Result<&str> {
        let key = self.api_key.as_deref().ok_or_else(|| Error::OperationFailed {
            operation: "anthropic_request".to_string(),
            cause: "ANTHROPIC_API_KEY not set".to_string(),
        })?;
        if !Self::is_valid_api_key_format(key) {
            return Err(Error::OperationFailed {
                operation: "anthropic_request".to_string(),
                cause: "Invalid API key format: expected 'sk-ant-' prefix".to_string(),
            });
        }
        Ok(key)
    }

    /// Keys start with `sk-ant-`, are at least 40 characters, and contain
    /// only alphanumerics, hyphens and underscores.
    fn is_valid_api_key_format(key: &str) -> bool {
        const MIN_KEY_LENGTH: usize = 40;
        const PREFIX: &str = "sk-ant-";

        key.starts_with(PREFIX)
            && key.len() >= MIN_KEY_LENGTH
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Makes a request to the Messages API.
    fn request(&self, system: Option<&str>, user: &str) -> Result<String> {
        let api_key = self.validate()?;
        tracing::debug!(provider = "anthropic", model = %self.model, "Making LLM request");

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.map(ToString::to_string),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::error!(
                    provider = "anthropic",
                    model = %self.model,
                    error = %e,
                    error_kind,
                    "LLM request failed"
                );
                Error::Upstream {
                    service: "anthropic".to_string(),
                    cause: format!("{error_kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(provider = "anthropic", status = %status, "LLM API returned error status");
            return Err(Error::Upstream {
                service: "anthropic".to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        let response: MessagesResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "anthropic_response".to_string(),
            cause: e.to_string(),
        })?;
        response.text().ok_or_else(|| Error::OperationFailed {
            operation: "anthropic_response".to_string(),
            cause: "No text content in response".to_string(),
        })
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.request(None, prompt)
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(Some(system), user)
    }
}

/// Request to the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

/// A message in the conversation.
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Response from the Messages API.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenates the text blocks.
    fn text(&self) -> Option<String> {
        let text: Vec<&str> = self
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();
        (!text.is_empty()).then(|| text.concat())
    }
}

/// A content block in the response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_KEY: &str = "sk-ant-REDACTED";

    #[test]
    fn test_client_configuration() {
        let client = AnthropicClient::new()
            .with_api_key(VALID_KEY)
            .with_endpoint("https://custom.endpoint")
            .with_model("claude-3-opus-20240229");

        assert_eq!(client.name(), "anthropic");
        assert_eq!(client.endpoint, "https://custom.endpoint");
        assert_eq!(client.model, "claude-3-opus-20240229");
        assert!(client.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_or_malformed_key() {
        let mut client = AnthropicClient::new();
        client.api_key = None;
        assert!(client.validate().is_err());

        for key in ["invalid-key", "sk-ant-", "sk-ant-REDACTED!@#$"] {
            assert!(!AnthropicClient::is_valid_api_key_format(key), "{key}");
        }
        assert!(AnthropicClient::is_valid_api_key_format(VALID_KEY));
    }

    #[test]
    fn test_request_carries_system_prompt() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 10,
            system: Some("rules".to_string()),
            messages: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"], "rules");
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"x = 2"},{"type":"tool_use"},{"type":"text","text":"\nstep"}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("x = 2\nstep"));

        let empty: MessagesResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }
}
