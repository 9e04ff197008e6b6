//! OpenAI-compatible chat completions provider
//!
//! Works against the OpenAI API and any server exposing the same
//! `/chat/completions` endpoint (vLLM, llama.cpp, LM Studio, Azure).
//!
//! ```no_run
//! use council_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpenAIConfig::new("not-needed").with_api_base("http://localhost:1234/v1");
//! let provider = OpenAIProvider::with_config(config)?;
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key sent as a bearer token
    pub api_key: String,

    /// Base URL, without the `/chat/completions` suffix
    pub api_base: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Config with the given key and default endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read `OPENAI_API_KEY` and, if set, `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| DEFAULT_OPENAI_API_BASE.to_string());

        Ok(Self {
            api_key,
            api_base,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Set a custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the HTTP timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// OpenAI chat completions provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a provider from environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to {}", self.config.endpoint());

        let openai_request = OpenAIRequest {
            model: request.model.clone(),
            messages: build_openai_messages(request.system, request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_output.then(ResponseFormat::json_object),
        };

        let response = self
            .client
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(request.model),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::UnexpectedResponse(format!("Failed to parse response: {e}")))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = openai_response.usage.unwrap_or_default();
        debug!(
            "Received response - finish_reason: {}, tokens: {}/{}",
            choice.finish_reason.as_deref().unwrap_or("none"),
            usage.prompt_tokens,
            usage.completion_tokens
        );

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            stop_reason: map_stop_reason(choice.finish_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, PartialEq)]
struct OpenAIMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl ResponseFormat {
    fn json_object() -> Self {
        Self {
            format_type: "json_object",
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// System prompt first, then the conversation
fn build_openai_messages(system: Option<String>, messages: Vec<Message>) -> Vec<OpenAIMessage> {
    system
        .map(Message::system)
        .into_iter()
        .chain(messages)
        .map(|message| OpenAIMessage {
            role: message.role.as_str(),
            content: message.content,
        })
        .collect()
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        Some("content_filter") => {
            debug!("Content filtered by provider safety systems");
            StopReason::ContentFilter
        }
        Some("stop") | None => StopReason::EndTurn,
        Some(other) => {
            debug!("Unknown finish reason: {other}");
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.config().api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let config = OpenAIConfig::new("k")
            .with_api_base("http://localhost:1234/v1/")
            .with_timeout(30);
        assert_eq!(config.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_config_from_env() {
        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
        }
        assert!(matches!(
            OpenAIConfig::from_env(),
            Err(LLMError::ConfigurationError(_))
        ));

        unsafe {
            std::env::set_var("OPENAI_API_KEY", "test-key-from-env");
            std::env::set_var("OPENAI_API_BASE", "https://custom.openai.com/v1");
        }
        let config = OpenAIConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-key-from-env");
        assert_eq!(config.api_base, "https://custom.openai.com/v1");

        unsafe {
            std::env::remove_var("OPENAI_API_KEY");
            std::env::remove_var("OPENAI_API_BASE");
        }
    }

    #[test]
    fn test_system_prompt_leads_messages() {
        let messages = build_openai_messages(
            Some("You are a news analyst".to_string()),
            vec![Message::user("AAPL?"), Message::assistant("{}")],
        );

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(messages[0].content, "You are a news analyst");
    }

    #[test]
    fn test_request_serialization() {
        let request = OpenAIRequest {
            model: "gpt-4o-mini".to_string(),
            messages: build_openai_messages(None, vec![Message::user("hi")]),
            max_tokens: 800,
            temperature: None,
            response_format: Some(ResponseFormat::json_object()),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 800,
                "response_format": {"type": "json_object"}
            })
        );
    }

    #[test]
    fn test_response_parsing() {
        let body = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "{\"action\": \"BUY\"}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        });

        let response: OpenAIResponse = serde_json::from_value(body).unwrap();
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens + usage.completion_tokens, 150);
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("{\"action\": \"BUY\"}")
        );
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason(Some("stop")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(Some("length")), StopReason::MaxTokens);
        assert_eq!(map_stop_reason(Some("content_filter")), StopReason::ContentFilter);
        assert_eq!(map_stop_reason(Some("tool_calls")), StopReason::EndTurn);
        assert_eq!(map_stop_reason(None), StopReason::EndTurn);
    }
}
