//! Cheap token estimation
//!
//! Roughly four characters per token for English text. Used for context
//! budgeting and for usage metadata when the provider reports no counts.

use chatline_llm::LlmMessage;

const CHARS_PER_TOKEN: usize = 4;

/// Estimated tokens for `text`: ceil(chars / 4), so any non-empty text is at least 1
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Estimated tokens for a whole context
pub fn estimate_messages<'a>(messages: impl IntoIterator<Item = &'a LlmMessage>) -> u32 {
    messages
        .into_iter()
        .map(|m| estimate_tokens(&m.content))
        .fold(0u32, u32::saturating_add)
}
