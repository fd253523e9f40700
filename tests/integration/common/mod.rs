//! Common test utilities and fixtures for integration tests
//!
//! This module provides shared infrastructure for all integration tests including:
//! - A composed application over the mock completion provider
//! - Request builders and body parsing

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use serde_json::Value;

use chatline_app::{build_pipeline, build_router, with_layers, AppConfig};
use chatline_chat::RequestPipeline;
use chatline_common::Config;
use chatline_llm::mock::MockLlmService;

/// Test application sharing one pipeline across requests, like a warm instance
pub struct TestApp {
    pub pipeline: Arc<RequestPipeline>,
    pub llm: MockLlmService,
    router: Router,
}

impl TestApp {
    /// Application with default limits
    pub fn new() -> Result<Self> {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        let llm = MockLlmService::new();
        let pipeline = build_pipeline(config, Arc::new(llm.clone()))?;
        let http = Config {
            cors_allowed_origins: "*".to_string(),
            max_body_bytes: 64 * 1024,
            rust_log: "info".to_string(),
            port: 0,
        };
        let router = with_layers(build_router(Arc::clone(&pipeline)), &http);
        Ok(Self {
            pipeline,
            llm,
            router,
        })
    }

    /// A clone of the router for one `oneshot` call
    pub fn test_router(&self) -> Router {
        self.router.clone()
    }
}

/// Build a chat request for `user`
pub fn chat_request(user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a body-less request
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse response body as JSON Value
pub async fn parse_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
