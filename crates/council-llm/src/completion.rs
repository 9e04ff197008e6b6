//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// One completion call: a system prompt plus the conversation so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Constrain the reply to a single JSON object
    #[serde(default)]
    pub json_output: bool,
}

/// Reply to a [`CompletionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Assistant reply that ended normally
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }

    /// Same reply with a different stop reason
    pub fn with_stop_reason(mut self, stop_reason: StopReason) -> Self {
        self.stop_reason = stop_reason;
        self
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    /// Output was cut at `max_tokens`; any JSON is likely unterminated
    MaxTokens,
    /// Output withheld by a content filter
    ContentFilter,
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults_to_free_text() {
        let request: CompletionRequest = serde_json::from_value(json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "AAPL?"}],
            "max_tokens": 800
        }))
        .unwrap();

        assert!(!request.json_output);
        assert_eq!(request.system, None);
        assert_eq!(request.messages[0].text(), "AAPL?");
    }

    #[test]
    fn test_response_stop_reason() {
        let response = CompletionResponse::text("{}").with_stop_reason(StopReason::MaxTokens);
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.total(), 0);
    }
}
