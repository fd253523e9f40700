//! Bounded-state invariants observed through the API

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use chatline_app::AppConfig;
use chatline_conversations::StoreConfig;
use chatline_ratelimit::RateLimitConfig;

use crate::common::{chat_request, empty_request, parse_body, TestApp};

fn generous_limits(store: StoreConfig) -> AppConfig {
    AppConfig {
        rate_limit: RateLimitConfig {
            max_requests: 10_000,
            ..Default::default()
        },
        store,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_history_keeps_last_twenty_messages() {
    let app = TestApp::with_config(generous_limits(StoreConfig::default())).unwrap();

    for i in 0..25 {
        let response = app
            .test_router()
            .oneshot(chat_request(
                "u1",
                json!({"message": format!("turn {}", i), "conversation_id": "long"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .test_router()
        .oneshot(empty_request(Method::GET, "/v1/conversations/long/messages"))
        .await
        .unwrap();
    let body = parse_body(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 20);
    assert_eq!(messages[0]["content"], "turn 15");
    assert_eq!(messages[19]["content"], "Mock response to: turn 24");
}

#[tokio::test]
async fn test_least_recently_used_conversation_is_evicted() {
    let app = TestApp::with_config(generous_limits(StoreConfig {
        max_conversations: 2,
        ..Default::default()
    }))
    .unwrap();

    for id in ["a", "b"] {
        app.test_router()
            .oneshot(chat_request("u1", json!({"message": "hi", "conversation_id": id})))
            .await
            .unwrap();
    }
    // Touch "a" so "b" becomes least recently used
    app.test_router()
        .oneshot(empty_request(Method::GET, "/v1/conversations/a/messages"))
        .await
        .unwrap();
    app.test_router()
        .oneshot(chat_request("u1", json!({"message": "hi", "conversation_id": "c"})))
        .await
        .unwrap();

    let store = app.pipeline.store();
    assert_eq!(store.len(), 2);
    assert!(store.contains("a"));
    assert!(!store.contains("b"));
    assert!(store.contains("c"));
}

#[tokio::test]
async fn test_concurrent_requests_share_state_safely() {
    let app = Arc::new(TestApp::with_config(generous_limits(StoreConfig::default())).unwrap());
    app.llm.set_delay(Duration::from_millis(20));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                let conversation = format!("c{}", i % 4);
                let response = app
                    .test_router()
                    .oneshot(chat_request(
                        "shared-user",
                        json!({"message": format!("m{}", i), "conversation_id": conversation}),
                    ))
                    .await
                    .unwrap();
                response.status()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let store = app.pipeline.store();
    assert_eq!(store.len(), 4);
    for i in 0..4 {
        let history = store.get_history(&format!("c{}", i));
        assert_eq!(history.len(), 8);
        for pair in history.chunks(2) {
            assert_eq!(pair[1].content, format!("Mock response to: {}", pair[0].content));
        }
    }
}

#[tokio::test]
async fn test_slow_provider_call_does_not_block_other_conversations() {
    let app = Arc::new(TestApp::with_config(generous_limits(StoreConfig::default())).unwrap());
    app.llm.stall_on("take your time", Duration::from_secs(2));

    let slow = {
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            app.test_router()
                .oneshot(chat_request(
                    "u1",
                    json!({"message": "take your time", "conversation_id": "slow"}),
                ))
                .await
                .unwrap()
                .status()
        })
    };

    // Wait until the slow call is in flight
    tokio::time::timeout(Duration::from_secs(1), async {
        while app.llm.call_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("slow call never reached the provider");

    let fast = tokio::time::timeout(
        Duration::from_millis(500),
        app.test_router().oneshot(chat_request(
            "u2",
            json!({"message": "quick one", "conversation_id": "fast"}),
        )),
    )
    .await
    .expect("request on another conversation waited for the slow call")
    .unwrap();
    assert_eq!(fast.status(), StatusCode::OK);

    let history = tokio::time::timeout(
        Duration::from_millis(500),
        app.test_router()
            .oneshot(empty_request(Method::GET, "/v1/conversations/fast/messages")),
    )
    .await
    .expect("history read waited for the slow call")
    .unwrap();
    assert_eq!(parse_body(history).await["messages"].as_array().unwrap().len(), 2);
    assert!(!app.pipeline.store().contains("slow"));

    assert_eq!(slow.await.unwrap(), StatusCode::OK);
    assert_eq!(app.pipeline.store().get_history("slow").len(), 2);
}

#[tokio::test]
async fn test_rate_limit_shared_across_conversations() {
    let app = TestApp::with_config(AppConfig {
        rate_limit: RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();

    let mut statuses = Vec::new();
    for i in 0..4 {
        let response = app
            .test_router()
            .oneshot(chat_request(
                "u1",
                json!({"message": "hi", "conversation_id": format!("conv-{}", i)}),
            ))
            .await
            .unwrap();
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );
    assert!(!app.pipeline.store().contains("conv-3"));
}
