//! Chat domain state

use crate::RequestPipeline;
use std::sync::Arc;

/// Application state for the Chat domain
#[derive(Clone)]
pub struct ChatState {
    pub pipeline: Arc<RequestPipeline>,
}

impl ChatState {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }
}
