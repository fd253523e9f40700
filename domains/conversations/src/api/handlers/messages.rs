//! Message API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chatline_common::Result;
use serde::Serialize;

use super::validate_conversation_id;
use crate::api::middleware::ConversationsState;
use crate::domain::entities::Message;

/// Conversation history response DTO
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// List the current history of a conversation, oldest first
pub async fn list_messages(
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<MessagesResponse>> {
    validate_conversation_id(&conversation_id)?;

    let messages = state.store.get_history(&conversation_id);
    Ok(Json(MessagesResponse {
        conversation_id,
        messages,
    }))
}
