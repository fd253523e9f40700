pub mod conversations;
pub mod messages;

use chatline_common::{Error, Result};

/// Longest accepted conversation identifier, in characters
pub const MAX_CONVERSATION_ID_LENGTH: usize = 128;

pub(crate) fn validate_conversation_id(conversation_id: &str) -> Result<()> {
    let len = conversation_id.chars().count();
    if len == 0 || len > MAX_CONVERSATION_ID_LENGTH {
        return Err(Error::Validation(format!(
            "conversation_id must be 1 to {} characters",
            MAX_CONVERSATION_ID_LENGTH
        )));
    }
    Ok(())
}
