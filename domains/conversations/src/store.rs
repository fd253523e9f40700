//! In-process conversation store
//!
//! Holds every live conversation in one LRU map (hash index plus recency
//! list, O(1) touch and evict). Two independent bounds apply:
//! - per conversation, at most `max_history` messages, oldest dropped first
//! - globally, at most `max_conversations`, least recently accessed evicted whole
//!
//! Conversations idle past `idle_ttl` are swept lazily from the LRU end on
//! every access.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;
use thiserror::Error;

use chatline_common::{env_or, env_secs};

use crate::domain::entities::{Conversation, Message};

/// Default messages kept per conversation
pub const DEFAULT_MAX_HISTORY: usize = 20;

/// Default conversations kept per process
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

/// Default idle lifetime of a conversation, in seconds
pub const DEFAULT_IDLE_TTL_SECONDS: u64 = 3600;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Conversation store configuration error: {0}")]
    Configuration(String),
}

/// Conversation store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub max_history: usize,
    pub max_conversations: usize,
    /// `None` disables the idle sweep
    pub idle_ttl: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            idle_ttl: Some(Duration::from_secs(DEFAULT_IDLE_TTL_SECONDS)),
        }
    }
}

impl StoreConfig {
    /// Create store config from environment variables
    pub fn from_env() -> Result<Self, StoreError> {
        let idle_ttl = env_secs("CONVERSATION_IDLE_TTL_SECS", DEFAULT_IDLE_TTL_SECONDS);
        let config = Self {
            max_history: env_or("MAX_HISTORY", DEFAULT_MAX_HISTORY),
            max_conversations: env_or("MAX_CONVERSATIONS", DEFAULT_MAX_CONVERSATIONS),
            idle_ttl: (!idle_ttl.is_zero()).then_some(idle_ttl),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_history == 0 {
            return Err(StoreError::Configuration(
                "MAX_HISTORY must be at least 1".to_string(),
            ));
        }
        if self.max_conversations == 0 {
            return Err(StoreError::Configuration(
                "MAX_CONVERSATIONS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read-only copy of a conversation after a write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// Shared conversation store.
///
/// One mutex guards all structural operations; no method holds it across
/// an await point, and callers only ever receive owned copies.
pub struct ConversationStore {
    config: StoreConfig,
    conversations: Mutex<LruCache<String, Conversation>>,
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("config", &self.config)
            .field("conversations", &self.len())
            .finish()
    }
}

impl ConversationStore {
    /// Create a store, rejecting zero capacities
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_conversations).ok_or_else(|| {
            StoreError::Configuration("MAX_CONVERSATIONS must be at least 1".to_string())
        })?;

        Ok(Self {
            config,
            conversations: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Append one message, creating the conversation if needed
    pub fn append(&self, conversation_id: &str, message: Message) -> ConversationSnapshot {
        self.append_at(conversation_id, vec![message], Instant::now())
    }

    /// Append a user message and its reply as one atomic turn
    pub fn append_turn(
        &self,
        conversation_id: &str,
        user: Message,
        assistant: Message,
    ) -> ConversationSnapshot {
        self.append_at(conversation_id, vec![user, assistant], Instant::now())
    }

    /// Append messages in order with an explicit timestamp
    pub fn append_at(
        &self,
        conversation_id: &str,
        messages: Vec<Message>,
        now: Instant,
    ) -> ConversationSnapshot {
        let mut conversations = self.lock();
        self.purge_idle_locked(&mut conversations, now);

        let max_history = self.config.max_history;
        if let Some(conversation) = conversations.get_mut(conversation_id) {
            conversation.last_access = now;
            for message in messages {
                conversation.push(message, max_history);
            }
            return ConversationSnapshot {
                conversation_id: conversation_id.to_string(),
                messages: conversation.snapshot(),
            };
        }

        let mut conversation = Conversation::new(conversation_id, now);
        for message in messages {
            conversation.push(message, max_history);
        }
        let snapshot = conversation.snapshot();

        if let Some((evicted, _)) = conversations.push(conversation_id.to_string(), conversation) {
            tracing::debug!(
                conversation_id = %evicted,
                "Store at capacity, evicted least recently used conversation"
            );
        }

        ConversationSnapshot {
            conversation_id: conversation_id.to_string(),
            messages: snapshot,
        }
    }

    /// Current messages for a conversation, empty if unknown
    pub fn get_history(&self, conversation_id: &str) -> Vec<Message> {
        self.get_history_at(conversation_id, Instant::now())
    }

    pub fn get_history_at(&self, conversation_id: &str, now: Instant) -> Vec<Message> {
        let mut conversations = self.lock();
        self.purge_idle_locked(&mut conversations, now);

        match conversations.get_mut(conversation_id) {
            Some(conversation) => {
                conversation.last_access = now;
                conversation.snapshot()
            }
            None => Vec::new(),
        }
    }

    /// Delete a conversation; returns whether it existed
    pub fn remove(&self, conversation_id: &str) -> bool {
        self.lock().pop(conversation_id).is_some()
    }

    /// Sweep conversations idle past the TTL; returns how many were dropped
    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let mut conversations = self.lock();
        self.purge_idle_locked(&mut conversations, now)
    }

    /// Whether a conversation exists, without touching its recency
    pub fn contains(&self, conversation_id: &str) -> bool {
        self.lock().contains(conversation_id)
    }

    /// Number of live conversations
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_idle_locked(
        &self,
        conversations: &mut LruCache<String, Conversation>,
        now: Instant,
    ) -> usize {
        let Some(ttl) = self.config.idle_ttl else {
            return 0;
        };

        let mut purged = 0;
        // LRU order is last_access order, so stop at the first live entry
        while let Some((_, conversation)) = conversations.peek_lru() {
            if now.saturating_duration_since(conversation.last_access) < ttl {
                break;
            }
            if let Some((id, _)) = conversations.pop_lru() {
                tracing::debug!(conversation_id = %id, "Expired idle conversation");
            }
            purged += 1;
        }
        purged
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Conversation>> {
        // Every mutation leaves the map consistent, so a poisoned lock is still usable
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
