//! Conversations domain layer: entities

pub mod entities;
