//! Conversations domain: bounded in-memory conversation history

pub mod api;
pub mod domain;
pub mod store;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{Conversation, Message, MessageRole};

pub use store::{ConversationSnapshot, ConversationStore, StoreConfig, StoreError};

// Re-export API types
pub use api::routes;
pub use api::ConversationsState;
