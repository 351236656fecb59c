#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use insight::error::{InsightError, InsightResult};
use insight::providers::{ChatRequest, ChatResponse, Provider, ProviderClient, ProviderManager, ToolCall};
use insight::tools::{Tool, ToolRegistry};

pub const ALICE: &str = "0xC22166664e820cdA6bf4cedBdbb4fa1E6A84C440";
pub const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

/// Provider that replays canned responses in order and records every request.
pub struct ScriptedProvider {
    provider: Provider,
    script: Mutex<VecDeque<InsightResult<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(provider: Provider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_text(&self, content: &str) {
        let response = self.response(content, Vec::new());
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        let response = self.response("", calls);
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(InsightError::provider(message)));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn response(&self, content: &str, tool_calls: Vec<ToolCall>) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            tool_calls,
            model: "scripted".to_string(),
            provider: self.provider,
            usage: None,
        }
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InsightError::provider("script exhausted")))
    }

    fn get_provider(&self) -> Provider {
        self.provider
    }

    fn get_default_model(&self) -> &str {
        "scripted"
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// Tool returning a fixed value (or failing) and recording its arguments.
pub struct RecordingTool {
    name: String,
    output: Result<Value, String>,
    calls: Mutex<Vec<Value>>,
}

impl RecordingTool {
    pub fn ok(name: &str, output: Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            output: Ok(output),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            output: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Test tool"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        self.calls.lock().unwrap().push(args);
        match &self.output {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(InsightError::tool(message.clone())),
        }
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn manager_with(clients: &[Arc<ScriptedProvider>]) -> Arc<ProviderManager> {
    let manager = ProviderManager::new();
    for client in clients {
        manager.register_provider(client.clone()).await;
    }
    Arc::new(manager)
}

pub fn registry_with(tools: &[Arc<RecordingTool>]) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool.clone());
    }
    Arc::new(registry)
}
