//! Chatline LLM Service
//!
//! The external completion provider behind the chat pipeline:
//! - Anthropic Messages API over HTTP
//! - AWS Bedrock Runtime (`InvokeModel`) with LocalStack support
//! - Mock service with programmable outcomes for tests and local development

pub mod anthropic;
pub mod bedrock;
pub mod mock;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use chatline_common::{env_opt, env_or, env_secs};

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Default Bedrock model identifier
pub const DEFAULT_BEDROCK_MODEL: &str = "anthropic.claude-3-5-haiku-20241022-v1:0";

/// Default completion budget per request
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM request error: {0}")]
    Request(String),

    #[error("LLM response error: {0}")]
    Response(String),

    #[error("LLM provider rate limit exceeded")]
    RateLimit,

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout(_))
    }
}

/// Speaker of a message sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

impl LlmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmRole::User => "user",
            LlmRole::Assistant => "assistant",
        }
    }
}

/// One message of the context sent to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completion request: ordered context plus optional overrides
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model override; empty means the service default
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: Option<u32>,
}

/// Completion result. Token counts are present only when the provider reports them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub stop_reason: String,
}

/// LLM service configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// Provider (anthropic, bedrock, mock)
    pub provider: String,
    pub api_key: String,
    pub default_model: String,
    pub max_tokens: u32,
    /// Override for the Anthropic API base URL
    pub base_url: Option<String>,
    /// HTTP-level timeout for a single provider call
    pub request_timeout: Duration,
    /// AWS region for Bedrock
    pub aws_region: Option<String>,
    /// AWS endpoint URL (for LocalStack)
    pub aws_endpoint_url: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    #[mutants::skip] // Redaction only, no behavior to test
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("aws_region", &self.aws_region)
            .field("aws_endpoint_url", &self.aws_endpoint_url)
            .finish()
    }
}

impl LlmConfig {
    /// Create LLM config from environment variables
    pub fn from_env() -> Result<Self, LlmError> {
        dotenvy::dotenv().ok();

        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let api_key = env_opt("ANTHROPIC_API_KEY").unwrap_or_default();
        if provider == "anthropic" && api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY is required for anthropic provider".to_string(),
            ));
        }

        let default_model = match provider.as_str() {
            "bedrock" => env_opt("BEDROCK_MODEL_ID")
                .or_else(|| env_opt("LLM_MODEL"))
                .unwrap_or_else(|| DEFAULT_BEDROCK_MODEL.to_string()),
            _ => env_opt("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        Ok(Self {
            provider,
            api_key,
            default_model,
            max_tokens: env_or("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            base_url: env_opt("ANTHROPIC_BASE_URL"),
            request_timeout: env_secs("LLM_REQUEST_TIMEOUT_SECS", 30),
            aws_region: env_opt("AWS_REGION"),
            aws_endpoint_url: env_opt("AWS_ENDPOINT_URL"),
        })
    }

    /// Config for the mock provider
    pub fn mock() -> Self {
        Self {
            provider: "mock".to_string(),
            api_key: String::new(),
            default_model: mock::MOCK_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            base_url: None,
            request_timeout: Duration::from_secs(30),
            aws_region: None,
            aws_endpoint_url: None,
        }
    }
}

/// LLM service trait for different providers
#[async_trait::async_trait]
pub trait LlmService: Send + Sync {
    /// Run one completion over the given context
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;
}

/// Factory for creating LlmService implementations
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    /// Create an LlmService based on configuration
    pub async fn create(config: LlmConfig) -> Result<Box<dyn LlmService>, LlmError> {
        match config.provider.as_str() {
            "anthropic" => {
                tracing::info!(model = %config.default_model, "Creating Anthropic LLM service");
                Ok(Box::new(anthropic::AnthropicService::new(config)?))
            }
            "bedrock" => {
                tracing::info!(model = %config.default_model, "Creating Bedrock LLM service");
                Ok(Box::new(bedrock::BedrockService::new(config).await))
            }
            "mock" => {
                tracing::info!("Creating mock LLM service");
                Ok(Box::new(mock::MockLlmService::new()))
            }
            provider => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: anthropic, bedrock, mock",
                provider
            ))),
        }
    }
}
