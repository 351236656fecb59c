mod common;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use common::{call, manager_with, spawn_server, ScriptedProvider};
use insight::cache::{CachedClient, ResponseCache};
use insight::config::InsightConfig;
use insight::error::InsightResult;
use insight::providers::claude::ClaudeClient;
use insight::providers::gemini::GeminiClient;
use insight::providers::openai::OpenAIClient;
use insight::providers::{
    ChatMessage, ChatRequest, Provider, ProviderClient, ProviderManager, ToolDefinition,
};

type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

/// Fake upstream answering every POST with `reply` and capturing the request.
async fn fake_llm(path: &str, reply: Value) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let state = (captured.clone(), reply);

    let router = Router::new()
        .route(
            path,
            post(
                |State((captured, reply)): State<(Captured, Value)>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    captured.lock().unwrap().push((headers, body));
                    Json(reply)
                },
            ),
        )
        .with_state(state);

    (spawn_server(router).await, captured)
}

fn tool_request() -> ChatRequest {
    let lookup = call("call_1", "get_erc20_tokens", json!({ "owner_address": common::ALICE }));
    ChatRequest {
        messages: vec![
            ChatMessage::system("Use tools."),
            ChatMessage::user("Balances?"),
            ChatMessage::assistant_with_tools("", vec![lookup.clone()]),
            ChatMessage::tool(&lookup, r#"{"data":[]}"#),
        ],
        tools: vec![ToolDefinition {
            name: "get_erc20_tokens".to_string(),
            description: "ERC20 balances".to_string(),
            parameters: json!({ "type": "object", "properties": { "owner_address": { "type": "string" } } }),
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fallback_to_next_provider() -> InsightResult<()> {
    let primary = ScriptedProvider::new(Provider::Gemini);
    let backup = ScriptedProvider::new(Provider::OpenAI);
    primary.push_error("quota exceeded");
    backup.push_text("from backup");

    let manager = manager_with(&[primary.clone(), backup.clone()]).await;
    let response = manager.chat_completion(&ChatRequest::default()).await?;

    assert_eq!(response.content, "from backup");
    assert_eq!(response.provider, Provider::OpenAI);
    assert_eq!(primary.call_count(), 1);

    let status = manager.get_provider_status().await;
    let gemini = status
        .iter()
        .find(|(provider, _)| *provider == Provider::Gemini)
        .map(|(_, health)| health.clone())
        .expect("gemini health");
    assert!(!gemini.is_healthy);
    assert!(gemini.error_rate > 0.0);
    Ok(())
}

#[tokio::test]
async fn test_all_providers_failing() {
    let primary = ScriptedProvider::new(Provider::Gemini);
    primary.push_error("boom");

    let manager = manager_with(&[primary]).await;
    let error = manager.chat_completion(&ChatRequest::default()).await.unwrap_err();
    assert!(error.to_string().contains("All providers failed"));

    let empty = ProviderManager::new();
    let error = empty.chat_completion(&ChatRequest::default()).await.unwrap_err();
    assert!(error.to_string().contains("No providers configured"));
}

#[tokio::test]
async fn test_order_controls_routing() -> InsightResult<()> {
    let gemini = ScriptedProvider::new(Provider::Gemini);
    let claude = ScriptedProvider::new(Provider::Claude);
    claude.push_text("claude first");

    let manager = manager_with(&[gemini.clone(), claude.clone()]).await;
    manager.set_order(vec![Provider::Claude, Provider::Gemini]).await;

    let response = manager.chat_completion(&ChatRequest::default()).await?;
    assert_eq!(response.content, "claude first");
    assert_eq!(gemini.call_count(), 0);
    assert_eq!(manager.list_providers().await, vec![Provider::Claude, Provider::Gemini]);
    Ok(())
}

#[tokio::test]
async fn test_from_config_skips_providers_without_keys() {
    let mut config = InsightConfig::default();
    config.providers.openai.api_key = Some("sk-test".to_string());

    let manager = ProviderManager::from_config(&config, Provider::Gemini, None).await;

    assert_eq!(manager.list_providers().await, vec![Provider::OpenAI]);
}

#[tokio::test]
async fn test_identical_requests_hit_the_cache() -> InsightResult<()> {
    let inner = ScriptedProvider::new(Provider::Gemini);
    inner.push_text("first answer");
    inner.push_text("second answer");

    let cache = Arc::new(ResponseCache::new());
    let client = CachedClient::new(inner.clone(), cache.clone());

    let request = ChatRequest {
        messages: vec![ChatMessage::user("Price of ETH?")],
        ..Default::default()
    };

    let first = client.chat_completion(&request).await?;
    let second = client.chat_completion(&request).await?;
    assert_eq!(first.content, "first answer");
    assert_eq!(second.content, "first answer");
    assert_eq!(inner.call_count(), 1);
    assert_eq!(cache.len().await, 1);

    let different = ChatRequest {
        messages: vec![ChatMessage::user("Price of BTC?")],
        ..Default::default()
    };
    let third = client.chat_completion(&different).await?;
    assert_eq!(third.content, "second answer");
    assert_eq!(inner.call_count(), 2);

    cache.clear().await;
    assert!(cache.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_errors_are_not_cached() -> InsightResult<()> {
    let inner = ScriptedProvider::new(Provider::Gemini);
    inner.push_error("temporary");
    inner.push_text("recovered");

    let cache = Arc::new(ResponseCache::new());
    let client = CachedClient::new(inner.clone(), cache.clone());
    let request = ChatRequest::default();

    tokio_test::assert_err!(client.chat_completion(&request).await);
    let response = tokio_test::assert_ok!(client.chat_completion(&request).await);
    assert_eq!(response.content, "recovered");
    Ok(())
}

#[test]
fn test_fingerprint_depends_on_model() -> InsightResult<()> {
    let request = ChatRequest::default();
    let a = ResponseCache::fingerprint(Provider::OpenAI, "gpt-4o-mini", &request)?;
    let b = ResponseCache::fingerprint(Provider::OpenAI, "gpt-4o", &request)?;
    let c = ResponseCache::fingerprint(Provider::OpenAI, "gpt-4o-mini", &request)?;
    assert_ne!(a, b);
    assert_eq!(a, c);
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    Ok(())
}

#[tokio::test]
async fn test_openai_wire_format() -> InsightResult<()> {
    let (base_url, captured) = fake_llm(
        "/v1/chat/completions",
        json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": { "name": "resolve", "arguments": "{\"input_data\":\"vitalik.eth\"}" }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }),
    )
    .await;

    let client = OpenAIClient::with_api_key("sk-test".to_string()).with_base_url(base_url);
    let response = client.chat_completion(&tool_request()).await?;

    assert_eq!(response.provider, Provider::OpenAI);
    assert_eq!(response.tool_calls[0].id, "call_9");
    assert_eq!(response.tool_calls[0].arguments, json!({ "input_data": "vitalik.eth" }));
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(15));

    let (headers, body) = captured.lock().unwrap()[0].clone();
    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "get_erc20_tokens");
    assert_eq!(body["messages"][3]["role"], "tool");
    assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
    assert_eq!(body["tools"][0]["type"], "function");
    Ok(())
}

#[tokio::test]
async fn test_claude_wire_format() -> InsightResult<()> {
    let (base_url, captured) = fake_llm(
        "/v1/messages",
        json!({
            "model": "claude-3-haiku-20240307",
            "content": [
                { "type": "text", "text": "Classifying." },
                { "type": "tool_use", "id": "toolu_1", "name": "classify_intent", "input": { "intent": "query" } }
            ],
            "usage": { "input_tokens": 20, "output_tokens": 4 }
        }),
    )
    .await;

    let client = ClaudeClient::with_api_key("sk-ant".to_string()).with_base_url(base_url);
    let mut request = tool_request();
    request.tool_choice = Some("get_erc20_tokens".to_string());
    let response = client.chat_completion(&request).await?;

    assert_eq!(response.content, "Classifying.");
    assert_eq!(response.tool_calls[0].name, "classify_intent");
    assert_eq!(response.tool_calls[0].arguments["intent"], "query");
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(24));

    let (headers, body) = captured.lock().unwrap()[0].clone();
    assert_eq!(headers["x-api-key"], "sk-ant");
    assert!(headers.contains_key("anthropic-version"));
    assert_eq!(body["system"], "Use tools.");
    // user, assistant(tool_use), user(tool_result)
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
    assert_eq!(body["messages"][2]["content"][0]["type"], "tool_result");
    assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "call_1");
    assert_eq!(body["tool_choice"], json!({ "type": "tool", "name": "get_erc20_tokens" }));
    assert!(body["tools"][0].get("input_schema").is_some());
    Ok(())
}

#[tokio::test]
async fn test_gemini_wire_format() -> InsightResult<()> {
    let (base_url, captured) = fake_llm(
        "/v1beta/models/:model",
        json!({
            "modelVersion": "gemini-2.0-flash-exp",
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "functionCall": { "name": "get_token_prices", "args": { "token_addresses": ["0x1"] } } }]
                }
            }],
            "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3, "totalTokenCount": 10 }
        }),
    )
    .await;

    let client = GeminiClient::with_api_key("g-key".to_string()).with_base_url(base_url);
    let response = client.chat_completion(&tool_request()).await?;

    assert_eq!(response.provider, Provider::Gemini);
    assert_eq!(response.tool_calls[0].name, "get_token_prices");
    assert!(response.tool_calls[0].id.starts_with("call_"));
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(10));

    let (headers, body) = captured.lock().unwrap()[0].clone();
    assert_eq!(headers["x-goog-api-key"], "g-key");
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Use tools.");
    assert_eq!(body["contents"][1]["role"], "model");
    assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], "get_erc20_tokens");
    assert_eq!(
        body["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
        json!({ "data": [] })
    );
    assert_eq!(body["tools"][0]["functionDeclarations"][0]["name"], "get_erc20_tokens");
    Ok(())
}

#[tokio::test]
async fn test_upstream_error_is_a_provider_error() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
    );
    let base_url = spawn_server(router).await;

    let client = OpenAIClient::with_api_key("sk-test".to_string()).with_base_url(base_url);
    let error = client.chat_completion(&ChatRequest::default()).await.unwrap_err();
    assert!(error.to_string().contains("rate limited"));
}
