//! Chat domain layer: entities, validation, token estimation

pub mod entities;
pub mod tokens;
pub mod validation;
