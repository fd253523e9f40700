//! Request and reply types for the chat endpoint

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Most advisory history entries accepted in one request
pub const MAX_ADVISORY_HISTORY: usize = 100;

/// Client-side view of an earlier turn.
///
/// Advisory only: server-held history is authoritative for context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Inbound chat request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatRequest {
    /// User message; a missing field is treated as empty and rejected as such
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    #[validate(length(max = 100, message = "history may contain at most 100 entries"))]
    pub history: Vec<HistoryEntry>,

    /// Existing conversation to continue; a new id is generated when absent
    #[validate(length(min = 1, max = 128))]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            conversation_id: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Estimated token usage for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub input: u32,
    pub output: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub conversation_id: String,
    pub response_time_ms: u64,
    pub estimated_tokens: TokenEstimate,
}

/// Successful chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub metadata: ReplyMetadata,
}
