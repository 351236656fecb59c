mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

use common::{call, manager_with, registry_with, ScriptedProvider};
use insight::api::ApiServer;
use insight::assistant::Assistant;
use insight::chains::{IntentClassifier, ReasoningChain};
use insight::providers::Provider;
use insight::session::SessionStore;

struct TestApi {
    router: Router,
    classifier: Arc<ScriptedProvider>,
    llm: Arc<ScriptedProvider>,
}

async fn test_api(all_keys: bool) -> TestApi {
    let classifier = ScriptedProvider::new(Provider::Claude);
    let llm = ScriptedProvider::new(Provider::Gemini);

    let assistant = Assistant::new(
        IntentClassifier::new(manager_with(&[classifier.clone()]).await),
        ReasoningChain::new(manager_with(&[llm.clone()]).await, registry_with(&[])),
        Arc::new(SessionStore::new()),
    );

    let mut keys = BTreeMap::new();
    for service in ["thirdweb", "google", "anthropic", "exa", "openai"] {
        keys.insert(service.to_string(), all_keys);
    }

    TestApi {
        router: ApiServer::new(Arc::new(assistant), keys).create_router(),
        classifier,
        llm,
    }
}

fn general(classifier: &ScriptedProvider) {
    classifier.push_tool_calls(vec![call("c", "classify_intent", json!({ "intent": "general" }))]);
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_message_round_trip() {
    let api = test_api(true).await;
    general(&api.classifier);
    api.llm.push_text("Gas is the fee paid for computation.");

    let (status, body) = send(
        &api.router,
        Method::POST,
        "/api/conversation/alice",
        Some(json!({ "message": "What is gas?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Gas is the fee paid for computation.");
    assert_eq!(body["intent"], "general");
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["messages"][0]["role"], "user");
    assert!(body["messages"][0]["timestamp"].is_string());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_missing_message_is_rejected() {
    let api = test_api(true).await;

    let (status, body) = send(&api.router, Method::POST, "/api/conversation/alice", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Message is required");

    let (status, _) = send(&api.router, Method::POST, "/api/conversation/alice", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.classifier.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_operation_is_rejected() {
    let api = test_api(true).await;

    let (status, body) = send(
        &api.router,
        Method::POST,
        "/api/conversation/alice",
        Some(json!({ "operation": "rewind" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("rewind"));
}

#[tokio::test]
async fn test_history_and_clear_operations() {
    let api = test_api(true).await;
    general(&api.classifier);
    api.llm.push_text("Hello!");

    send(&api.router, Method::POST, "/api/conversation/alice", Some(json!({ "message": "Hi" }))).await;

    let (status, body) = send(&api.router, Method::GET, "/api/conversation/alice/history", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"][1]["content"], "Hello!");

    let (_, body) = send(
        &api.router,
        Method::POST,
        "/api/conversation/alice",
        Some(json!({ "operation": "history" })),
    )
    .await;
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));

    let (status, body) = send(
        &api.router,
        Method::POST,
        "/api/conversation/alice",
        Some(json!({ "operation": "clear" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = send(&api.router, Method::GET, "/api/conversation/alice/history", None).await;
    assert_eq!(body["messages"], json!([]));
}

#[tokio::test]
async fn test_health_counts_active_users() {
    let api = test_api(true).await;
    for user in ["alice", "bob"] {
        general(&api.classifier);
        api.llm.push_text("Hello!");
        send(&api.router, Method::POST, &format!("/api/conversation/{}", user), Some(json!({ "message": "Hi" }))).await;
    }

    let (_, body) = send(&api.router, Method::GET, "/api/health", None).await;
    assert_eq!(body["active_users"], 2);

    send(
        &api.router,
        Method::POST,
        "/api/conversation/bob",
        Some(json!({ "operation": "clear" })),
    )
    .await;
    let (_, body) = send(&api.router, Method::GET, "/api/health", None).await;
    assert_eq!(body["active_users"], 1);
}

#[tokio::test]
async fn test_assistant_failure_returns_friendly_response() {
    let api = test_api(true).await;
    general(&api.classifier);
    api.llm.push_error("upstream unavailable");

    let (status, body) = send(
        &api.router,
        Method::POST,
        "/api/conversation/bob",
        Some(json!({ "message": "What is ETH?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["response"], "I'm having trouble processing your request right now.");
    assert!(body["error"].as_str().unwrap_or_default().contains("upstream unavailable"));
    assert_eq!(body["messages"][0]["content"], "What is ETH?");
}

#[tokio::test]
async fn test_health_reports_missing_keys() {
    let api = test_api(false).await;

    let (status, body) = send(&api.router, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["api_keys"]["thirdweb"], false);
    assert_eq!(body["graph"], "available");
    assert_eq!(body["active_users"], 0);
    assert!(body["timestamp"].is_string());

    let healthy = test_api(true).await;
    let (_, body) = send(&healthy.router, Method::GET, "/api/health", None).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_answers_head() {
    let api = test_api(true).await;

    let (status, body) = send(&api.router, Method::HEAD, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_root_welcome() {
    let api = test_api(true).await;

    let (status, body) = send(&api.router, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap_or_default().contains("Welcome"));
    assert_eq!(body["health"], "/api/health");
}
