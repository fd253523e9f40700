//! Shared utilities, configuration, and error handling for Chatline
//!
//! This crate provides common functionality used across the Chatline application:
//! - Configuration management following 12-factor principles
//! - Error types and the response contract for rejected requests
//! - Request extractors (validated JSON bodies, caller identity)

pub mod config;
pub mod error;
pub mod extractors;

pub use config::{env_opt, env_or, env_secs, Config};
pub use error::{Error, InputRejection, Result};
pub use extractors::{ClientId, ValidatedJson};
