//! Chat domain: input validation, context assembly and the request pipeline

pub mod api;
pub mod domain;
pub mod pipeline;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{ChatReply, ChatRequest, HistoryEntry, ReplyMetadata, TokenEstimate};
pub use domain::tokens::estimate_tokens;
pub use domain::validation::{InputValidator, ValidationResult};

pub use pipeline::{ChatConfig, ChatConfigError, RequestPipeline};

// Re-export API types
pub use api::routes;
pub use api::ChatState;
