//! Mock LLM Service Implementation
//!
//! Used by `LlmServiceFactory` when provider is `"mock"`.
//! Replies deterministically by echoing the last message, and can be
//! programmed to fail, time out, or stall so pipeline error paths are testable.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::{CompletionRequest, CompletionResponse, LlmError, LlmService};

/// Model name reported by the mock
pub const MOCK_MODEL: &str = "mock-model";

/// What outcome the mock should produce
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MockOutcome {
    /// Echo the last message back
    #[default]
    Reply,
    /// Fail with an upstream error
    Fail,
    /// Fail with a provider timeout
    Timeout,
}

/// Mock LLM service for testing
#[derive(Debug, Clone, Default)]
pub struct MockLlmService {
    outcome: Arc<RwLock<MockOutcome>>,
    delay: Arc<RwLock<Duration>>,
    stall: Arc<RwLock<Option<(String, Duration)>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmService {
    /// Create a new mock LLM service
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the outcome of subsequent calls
    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.write().unwrap_or_else(PoisonError::into_inner) = outcome;
    }

    /// Configure a delay before each call resolves
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Delay only calls whose last message contains `needle`; others use the
    /// regular delay
    pub fn stall_on(&self, needle: impl Into<String>, delay: Duration) {
        *self.stall.write().unwrap_or_else(PoisonError::into_inner) = Some((needle.into(), delay));
    }

    fn delay_for(&self, request: &CompletionRequest) -> Duration {
        let last = request.messages.last().map(|m| m.content.as_str());
        if let Some((needle, delay)) = &*self.stall.read().unwrap_or_else(PoisonError::into_inner) {
            if last.is_some_and(|content| content.contains(needle.as_str())) {
                return *delay;
            }
        }
        *self.delay.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Reset to default behavior and clear recorded requests
    pub fn reset(&self) {
        self.set_outcome(MockOutcome::Reply);
        self.set_delay(Duration::ZERO);
        *self.stall.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[async_trait::async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        tracing::info!("Mock LLM service processing completion request");

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let delay = self.delay_for(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .outcome
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match outcome {
            MockOutcome::Reply => {}
            MockOutcome::Fail => {
                return Err(LlmError::Response("Mock upstream failure".to_string()));
            }
            MockOutcome::Timeout => return Err(LlmError::Timeout(delay)),
        }

        let model = if request.model.is_empty() {
            MOCK_MODEL.to_string()
        } else {
            request.model
        };

        // Generate a simple response based on the last user message
        let last_message = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or("empty");

        let content = format!("Mock response to: {}", last_message);
        let input_tokens = request
            .messages
            .iter()
            .map(|m| m.content.len() as u32 / 4)
            .sum::<u32>();
        let output_tokens = content.len() as u32 / 4;

        Ok(CompletionResponse {
            content,
            model,
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            stop_reason: "end_turn".to_string(),
        })
    }

    fn default_model(&self) -> &str {
        MOCK_MODEL
    }
}
