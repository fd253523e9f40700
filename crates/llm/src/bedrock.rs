//! AWS Bedrock Runtime Implementation
//!
//! Invokes Claude models through Bedrock `InvokeModel` using the Anthropic
//! Messages body format, with support for a LocalStack-style endpoint.

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::config::SharedCredentialsProvider;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client as BedrockClient;

use crate::anthropic::{MessageBody, MessagesRequest, MessagesResponse};
use crate::{CompletionRequest, CompletionResponse, LlmConfig, LlmError, LlmService};

/// Body version string Bedrock expects for Anthropic models
const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// AWS Bedrock LLM service implementation
pub struct BedrockService {
    client: BedrockClient,
    config: LlmConfig,
}

impl BedrockService {
    /// Create a new Bedrock service
    pub async fn new(config: LlmConfig) -> Self {
        let region = config
            .aws_region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let aws_config = match config.aws_endpoint_url.as_ref() {
            Some(endpoint_url) => {
                tracing::info!("Using custom AWS endpoint: {}", endpoint_url);

                // For LocalStack, use dummy credentials
                let credentials = Credentials::new(
                    "test-access-key",
                    "test-secret-key",
                    None,
                    None,
                    "localstack-bedrock-provider",
                );

                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(region))
                    .endpoint_url(endpoint_url)
                    .credentials_provider(SharedCredentialsProvider::new(credentials))
                    .load()
                    .await
            }
            None => {
                aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(region))
                    .load()
                    .await
            }
        };

        Self {
            client: BedrockClient::new(&aws_config),
            config,
        }
    }
}

/// Serialize a completion request into the Bedrock Anthropic body
fn build_body(request: &CompletionRequest, max_tokens: u32) -> Result<Vec<u8>, LlmError> {
    let body = MessagesRequest {
        model: None,
        anthropic_version: Some(BEDROCK_ANTHROPIC_VERSION),
        max_tokens,
        system: request.system_prompt.as_deref(),
        messages: request.messages.iter().map(MessageBody::from).collect(),
    };

    serde_json::to_vec(&body)
        .map_err(|e| LlmError::Request(format!("Failed to encode request body: {}", e)))
}

#[async_trait::async_trait]
impl LlmService for BedrockService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model_id = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);
        let body = build_body(&request, max_tokens)?;

        tracing::debug!(model_id = %model_id, max_tokens = %max_tokens, "Invoking Bedrock model");

        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                let message = format!("{}", aws_sdk_bedrockruntime::error::DisplayErrorContext(&e));
                if message.contains("ThrottlingException") {
                    LlmError::RateLimit
                } else {
                    LlmError::Request(format!("Bedrock InvokeModel failed: {}", message))
                }
            })?;

        let api_response: MessagesResponse = serde_json::from_slice(output.body().as_ref())
            .map_err(|e| LlmError::Response(format!("Failed to parse response: {}", e)))?;

        Ok(api_response.into_completion(model_id))
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }
}
