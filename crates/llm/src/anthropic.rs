//! Anthropic Claude API Implementation
//!
//! Calls the Anthropic Messages API (https://api.anthropic.com/v1/messages)
//! using reqwest HTTP client.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, CompletionResponse, LlmConfig, LlmError, LlmMessage, LlmService};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API request body
#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<&'a str>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<&'a str>,
    pub messages: Vec<MessageBody<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MessageBody<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a LlmMessage> for MessageBody<'a> {
    fn from(m: &'a LlmMessage) -> Self {
        Self {
            role: m.role.as_str(),
            content: &m.content,
        }
    }
}

/// Anthropic Messages API response body (shared with Bedrock, which
/// returns the same shape for Claude models)
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl MessagesResponse {
    /// Collapse text blocks into a completion, falling back to `model`
    /// when the body does not echo one
    pub(crate) fn into_completion(self, model: &str) -> CompletionResponse {
        let content = self
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let (input_tokens, output_tokens) = self
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or((None, None));

        CompletionResponse {
            content,
            model: self.model.unwrap_or_else(|| model.to_string()),
            input_tokens,
            output_tokens,
            stop_reason: self.stop_reason.unwrap_or_else(|| "end_turn".to_string()),
        }
    }
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic LLM service implementation
pub struct AnthropicService {
    client: Client,
    config: LlmConfig,
    base_url: String,
}

impl AnthropicService {
    /// Create a new Anthropic service
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY is required for anthropic provider".to_string(),
            ));
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait::async_trait]
impl LlmService for AnthropicService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);

        let body = MessagesRequest {
            model: Some(model),
            anthropic_version: None,
            max_tokens,
            system: request.system_prompt.as_deref(),
            messages: request.messages.iter().map(MessageBody::from).collect(),
        };

        let url = format!("{}/v1/messages", self.base_url);

        tracing::debug!(model = %model, max_tokens = %max_tokens, "Sending Anthropic API request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.request_timeout)
                } else {
                    LlmError::Request(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimit);
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            // Try to parse as API error
            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_body) {
                return Err(LlmError::Response(format!(
                    "Anthropic API error ({}): {}",
                    error_response.error.error_type, error_response.error.message
                )));
            }

            return Err(LlmError::Response(format!(
                "Anthropic API returned {}: {}",
                status, error_body
            )));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Response(format!("Failed to parse response: {}", e)))?;

        Ok(api_response.into_completion(model))
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            provider: "anthropic".to_string(),
            api_key: "test-key".to_string(),
            default_model: "claude-test".to_string(),
            base_url: Some(server.uri()),
            ..LlmConfig::mock()
        }
    }

    fn hello_request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![LlmMessage::user("Hello")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_complete_parses_text_blocks_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "text", "text": "Hi "},
                    {"type": "tool_use", "id": "t1"},
                    {"type": "text", "text": "there"}
                ],
                "model": "claude-test",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 3, "output_tokens": 2}
            })))
            .mount(&server)
            .await;

        let service = AnthropicService::new(config_for(&server)).unwrap();
        let response = service.complete(hello_request()).await.unwrap();

        assert_eq!(response.content, "Hi there");
        assert_eq!(response.model, "claude-test");
        assert_eq!(response.input_tokens, Some(3));
        assert_eq!(response.output_tokens, Some(2));
    }

    #[tokio::test]
    async fn test_complete_maps_429_to_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let service = AnthropicService::new(config_for(&server)).unwrap();
        let result = service.complete(hello_request()).await;
        assert!(matches!(result, Err(LlmError::RateLimit)));
    }

    #[tokio::test]
    async fn test_complete_surfaces_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "bad roles"}
            })))
            .mount(&server)
            .await;

        let service = AnthropicService::new(config_for(&server)).unwrap();
        let err = service.complete(hello_request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"));
        assert!(err.to_string().contains("bad roles"));
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = LlmConfig {
            provider: "anthropic".to_string(),
            ..LlmConfig::mock()
        };
        assert!(matches!(
            AnthropicService::new(config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_usage_yields_no_token_counts() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "ok"}],
            "stop_reason": null
        }))
        .unwrap();
        let completion = response.into_completion("fallback-model");
        assert_eq!(completion.model, "fallback-model");
        assert_eq!(completion.input_tokens, None);
        assert_eq!(completion.stop_reason, "end_turn");
    }
}
