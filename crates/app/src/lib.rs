//! Chatline application composition root
//!
//! Builds the process-wide shared state (rate limiter, conversation store,
//! completion provider) once and composes the domain routers over it.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use chatline_chat::{ChatConfig, ChatState, RequestPipeline};
use chatline_common::extractors::USER_ID_HEADER;
use chatline_common::Config;
use chatline_conversations::{ConversationStore, ConversationsState, StoreConfig};
use chatline_llm::{LlmConfig, LlmService, LlmServiceFactory};
use chatline_ratelimit::{RateLimitConfig, RateLimiter};

/// Domain configuration gathered from the environment
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub chat: ChatConfig,
    pub rate_limit: RateLimitConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            chat: ChatConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            store: StoreConfig::from_env()?,
        })
    }
}

/// Create the main application router from environment configuration
pub async fn create_app() -> anyhow::Result<Router> {
    let config = AppConfig::from_env()?;

    let llm_config = LlmConfig::from_env()?;
    let llm = LlmServiceFactory::create(llm_config)
        .await
        .context("Failed to create LLM service")?;

    let pipeline = build_pipeline(config, Arc::from(llm))?;
    Ok(build_router(pipeline))
}

/// Construct the shared state; zero capacities are fatal here
pub fn build_pipeline(
    config: AppConfig,
    llm: Arc<dyn LlmService>,
) -> anyhow::Result<Arc<RequestPipeline>> {
    config.chat.validate()?;
    let limiter = RateLimiter::new(config.rate_limit)?;
    let store = ConversationStore::new(config.store)?;

    tracing::info!(
        max_requests = limiter.config().max_requests,
        window_secs = limiter.config().window.as_secs(),
        max_history = store.config().max_history,
        max_conversations = store.config().max_conversations,
        "Shared state initialized"
    );

    Ok(Arc::new(RequestPipeline::new(
        config.chat,
        Arc::new(limiter),
        Arc::new(store),
        llm,
    )))
}

/// Compose domain routers over one pipeline
pub fn build_router(pipeline: Arc<RequestPipeline>) -> Router {
    let conversations_state = ConversationsState::new(Arc::clone(pipeline.store()));
    let chat_state = ChatState::new(pipeline);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "Chatline API v0.0.1-SNAPSHOT" }),
        )
        .merge(chatline_chat::routes().with_state(chat_state))
        .merge(chatline_conversations::routes().with_state(conversations_state))
}

/// Wrap a router in the shared HTTP layers
pub fn with_layers(app: Router, config: &Config) -> Router {
    app.layer(body_limit_layer(config.max_body_bytes))
        .layer(build_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}

/// CORS for a comma-separated origin list, `*` for any origin
pub fn build_cors_layer(origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_ID_HEADER)]);

    let origins = origins.trim();
    if origins == "*" || origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Reject request bodies larger than `max_bytes`
pub fn body_limit_layer(max_bytes: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(max_bytes)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
