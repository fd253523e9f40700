//! Chat API handler

use axum::{extract::State, Json};
use chatline_common::{ClientId, Result, ValidatedJson};

use crate::api::middleware::ChatState;
use crate::domain::entities::{ChatReply, ChatRequest};

/// Send a message and receive the assistant's reply.
///
/// Refused input answers 400 `INPUT_REJECTED` with `reason` one of `empty`,
/// `too_long`, `disallowed_pattern` or `invalid_encoding`; a rate-limited
/// caller gets 429 with `reason: rate_limited` and a `Retry-After` header.
pub async fn chat(
    State(state): State<ChatState>,
    client: ClientId,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatReply>> {
    let reply = state.pipeline.handle(client.as_str(), req).await?;
    Ok(Json(reply))
}
