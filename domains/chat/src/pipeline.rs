//! Per-request orchestration
//!
//! validate → rate-limit → read history → assemble context → provider call →
//! record turn → reply. Each step short-circuits on failure. The store lock
//! is taken once to read history and once to record the turn; the provider
//! call in between runs with no lock held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use chatline_common::{env_opt, env_or, env_secs, Error, Result};
use chatline_conversations::{ConversationStore, Message, MessageRole};
use chatline_llm::{CompletionRequest, LlmError, LlmMessage, LlmService};
use chatline_ratelimit::{Decision, RateLimiter};

use crate::domain::entities::{ChatReply, ChatRequest, ReplyMetadata, TokenEstimate};
use crate::domain::tokens::{estimate_messages, estimate_tokens};
use crate::domain::validation::{InputValidator, DEFAULT_MAX_INPUT_LENGTH};

/// Default most messages sent to the provider per request
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 20;

/// Default estimated-token budget for the sent context
pub const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 8000;

/// Default provider deadline, in seconds
pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 25;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatConfigError {
    #[error("Chat configuration error: {0}")]
    Configuration(String),
}

/// Chat pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub max_input_length: usize,
    pub max_context_messages: usize,
    pub max_context_tokens: u32,
    pub provider_timeout: Duration,
    pub system_prompt: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECONDS),
            system_prompt: None,
        }
    }
}

impl ChatConfig {
    /// Create chat config from environment variables
    pub fn from_env() -> std::result::Result<Self, ChatConfigError> {
        let config = Self {
            max_input_length: env_or("MAX_INPUT_LENGTH", DEFAULT_MAX_INPUT_LENGTH),
            max_context_messages: env_or("MAX_CONTEXT_MESSAGES", DEFAULT_MAX_CONTEXT_MESSAGES),
            max_context_tokens: env_or("MAX_CONTEXT_TOKENS", DEFAULT_MAX_CONTEXT_TOKENS),
            provider_timeout: env_secs("PROVIDER_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECONDS),
            system_prompt: env_opt("SYSTEM_PROMPT"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ChatConfigError> {
        if self.max_input_length == 0 {
            return Err(ChatConfigError::Configuration(
                "MAX_INPUT_LENGTH must be at least 1".to_string(),
            ));
        }
        if self.max_context_messages == 0 {
            return Err(ChatConfigError::Configuration(
                "MAX_CONTEXT_MESSAGES must be at least 1".to_string(),
            ));
        }
        if self.provider_timeout.is_zero() {
            return Err(ChatConfigError::Configuration(
                "PROVIDER_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Handles one chat request end to end against the shared state
pub struct RequestPipeline {
    config: ChatConfig,
    validator: InputValidator,
    limiter: Arc<RateLimiter>,
    store: Arc<ConversationStore>,
    llm: Arc<dyn LlmService>,
}

impl RequestPipeline {
    pub fn new(
        config: ChatConfig,
        limiter: Arc<RateLimiter>,
        store: Arc<ConversationStore>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        Self {
            validator: InputValidator::new(config.max_input_length),
            config,
            limiter,
            store,
            llm,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one request for `client_id`
    pub async fn handle(&self, client_id: &str, request: ChatRequest) -> Result<ChatReply> {
        let started = Instant::now();

        // Rejected input never reaches the limiter
        let validation = self.validator.validate(&request.message);
        if let Err(reason) = validation.into_result() {
            tracing::info!(
                client_id = %client_id,
                reason = %reason,
                pattern = validation.matched_pattern.unwrap_or("-"),
                "Rejected chat input"
            );
            return Err(Error::InputRejected(reason));
        }

        match self.limiter.check_and_record(client_id) {
            Decision::Rejected { retry_after } => {
                tracing::warn!(
                    client_id = %client_id,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                return Err(Error::RateLimited { retry_after });
            }
            Decision::Admitted { remaining } => {
                tracing::debug!(client_id = %client_id, remaining, "Request admitted");
            }
        }

        let conversation_id = request
            .conversation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if !request.history.is_empty() {
            tracing::debug!(
                conversation_id = %conversation_id,
                advisory_entries = request.history.len(),
                "Ignoring client-supplied history"
            );
        }

        let history = self.store.get_history(&conversation_id);
        let context = assemble_context(
            &history,
            &request.message,
            self.config.max_context_messages,
            self.config.max_context_tokens,
        );
        let context_tokens = estimate_messages(&context)
            .saturating_add(self.config.system_prompt.as_deref().map_or(0, estimate_tokens));

        let completion_request = CompletionRequest {
            system_prompt: self.config.system_prompt.clone(),
            messages: context,
            ..Default::default()
        };

        let completion =
            match tokio::time::timeout(self.config.provider_timeout, self.llm.complete(completion_request))
                .await
            {
                Ok(Ok(completion)) => completion,
                Ok(Err(e)) => return Err(provider_error(&conversation_id, e)),
                Err(_) => {
                    return Err(provider_error(
                        &conversation_id,
                        LlmError::Timeout(self.config.provider_timeout),
                    ))
                }
            };

        let estimated_tokens = TokenEstimate {
            input: completion.input_tokens.unwrap_or(context_tokens),
            output: completion
                .output_tokens
                .unwrap_or_else(|| estimate_tokens(&completion.content)),
        };

        let snapshot = self.store.append_turn(
            &conversation_id,
            Message::user(request.message),
            Message::assistant(completion.content.clone()),
        );

        let response_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            conversation_id = %conversation_id,
            client_id = %client_id,
            model = %completion.model,
            history_len = snapshot.messages.len(),
            elapsed_ms = response_time_ms,
            "Chat turn completed"
        );

        Ok(ChatReply {
            reply: completion.content,
            metadata: ReplyMetadata {
                conversation_id,
                response_time_ms,
                estimated_tokens,
            },
        })
    }
}

fn provider_error(conversation_id: &str, e: LlmError) -> Error {
    tracing::warn!(conversation_id = %conversation_id, error = %e, "Completion provider failed");
    if e.is_timeout() {
        Error::ProviderTimeout(e.to_string())
    } else {
        Error::Provider(e.to_string())
    }
}

/// Build the provider context: the newest history that fits both budgets,
/// followed by the new user message.
///
/// The new message is always sent. The result never starts with an
/// assistant turn. Stored history is not touched.
pub fn assemble_context(
    history: &[Message],
    message: &str,
    max_messages: usize,
    max_tokens: u32,
) -> Vec<LlmMessage> {
    let mut budget = max_tokens.saturating_sub(estimate_tokens(message));
    let room = max_messages.saturating_sub(1);

    let mut kept: Vec<&Message> = Vec::with_capacity(room.min(history.len()));
    for prior in history.iter().rev().take(room) {
        let cost = estimate_tokens(&prior.content);
        if cost > budget {
            break;
        }
        budget -= cost;
        kept.push(prior);
    }

    // `kept` is newest first, so leading assistant turns sit at the end
    while kept.last().is_some_and(|m| m.role == MessageRole::Assistant) {
        kept.pop();
    }

    kept.into_iter()
        .rev()
        .map(to_llm_message)
        .chain(std::iter::once(LlmMessage::user(message)))
        .collect()
}

fn to_llm_message(message: &Message) -> LlmMessage {
    match message.role {
        MessageRole::User => LlmMessage::user(message.content.clone()),
        MessageRole::Assistant => LlmMessage::assistant(message.content.clone()),
    }
}
