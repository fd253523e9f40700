//! Conversation history endpoint integration tests

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::common::{chat_request, empty_request, parse_body, TestApp};

async fn send(app: &TestApp, conversation_id: &str, message: &str) {
    let response = app
        .test_router()
        .oneshot(chat_request(
            "u1",
            json!({"message": message, "conversation_id": conversation_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_history_lists_turns_in_order() {
    let app = TestApp::new().unwrap();
    send(&app, "c1", "Hello").await;
    send(&app, "c1", "How are you?").await;

    let response = app
        .test_router()
        .oneshot(empty_request(Method::GET, "/v1/conversations/c1/messages"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = parse_body(response).await;
    assert_eq!(body["conversation_id"], "c1");
    let messages = body["messages"].as_array().unwrap();
    let pairs: Vec<(&str, &str)> = messages
        .iter()
        .map(|m| (m["role"].as_str().unwrap(), m["content"].as_str().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("user", "Hello"),
            ("assistant", "Mock response to: Hello"),
            ("user", "How are you?"),
            ("assistant", "Mock response to: How are you?"),
        ]
    );
    assert!(messages[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_conversation_has_empty_history() {
    let app = TestApp::new().unwrap();
    let response = app
        .test_router()
        .oneshot(empty_request(Method::GET, "/v1/conversations/nobody/messages"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert_eq!(body["messages"], json!([]));
}

#[tokio::test]
async fn test_delete_conversation() {
    let app = TestApp::new().unwrap();
    send(&app, "gone", "Hello").await;

    let response = app
        .test_router()
        .oneshot(empty_request(Method::DELETE, "/v1/conversations/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.pipeline.store().contains("gone"));

    // Deleting again is still fine
    let response = app
        .test_router()
        .oneshot(empty_request(Method::DELETE, "/v1/conversations/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().unwrap();
    let response = app
        .test_router()
        .oneshot(empty_request(Method::GET, "/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
