//! Conversations domain state

use crate::ConversationStore;
use std::sync::Arc;

/// Application state for the Conversations domain
#[derive(Clone)]
pub struct ConversationsState {
    pub store: Arc<ConversationStore>,
}

impl ConversationsState {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self { store }
    }
}
