//! Route definitions for Conversations domain API

use axum::{routing::delete, routing::get, Router};

use super::handlers::{conversations, messages};
use super::middleware::ConversationsState;

/// Create conversation routes
fn conversation_routes() -> Router<ConversationsState> {
    Router::new().route(
        "/v1/conversations/{conversation_id}",
        delete(conversations::delete_conversation),
    )
}

/// Create message routes
fn message_routes() -> Router<ConversationsState> {
    Router::new().route(
        "/v1/conversations/{conversation_id}/messages",
        get(messages::list_messages),
    )
}

/// Create all Conversations domain API routes
pub fn routes() -> Router<ConversationsState> {
    Router::new()
        .merge(conversation_routes())
        .merge(message_routes())
}
