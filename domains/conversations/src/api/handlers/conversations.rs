//! Conversation management API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use chatline_common::Result;

use super::validate_conversation_id;
use crate::api::middleware::ConversationsState;

/// Delete a conversation and its history.
///
/// Deleting an unknown conversation is not an error.
pub async fn delete_conversation(
    State(state): State<ConversationsState>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode> {
    validate_conversation_id(&conversation_id)?;

    let existed = state.store.remove(&conversation_id);
    tracing::info!(%conversation_id, existed, "Deleted conversation");

    Ok(StatusCode::NO_CONTENT)
}
