//! API endpoint integration tests
//!
//! Drives the composed router end to end against the mock completion provider.

#![allow(dead_code)]

mod chat;
mod common;
mod conversations;
mod invariants;
