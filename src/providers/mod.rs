use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CachedClient, ResponseCache};
use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};

pub mod claude;
pub mod gemini;
pub mod openai;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Claude,
    OpenAI,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Claude => write!(f, "claude"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "claude" | "anthropic" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAI),
            _ => Err(InsightError::invalid_input(format!("Unknown provider: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, set on `Role::Tool` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
            ..Self::new(Role::Tool, content)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    /// Name of a tool the model must call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub model: String,
    pub provider: Provider,
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant_with_tools(self.content, self.tool_calls)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse>;
    fn get_provider(&self) -> Provider;
    fn get_default_model(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub provider: Provider,
    pub is_healthy: bool,
    pub last_check: Instant,
    pub response_time: Duration,
    pub error_rate: f32,
}

impl ProviderHealth {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            is_healthy: true,
            last_check: Instant::now(),
            response_time: Duration::from_millis(0),
            error_rate: 0.0,
        }
    }
}

/// Routes chat requests to the first provider in `order` that answers.
pub struct ProviderManager {
    providers: RwLock<HashMap<Provider, Arc<dyn ProviderClient>>>,
    order: RwLock<Vec<Provider>>,
    health: RwLock<HashMap<Provider, ProviderHealth>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// Registers every provider in `primary` followed by the configured
    /// fallbacks, skipping the ones without an API key.
    pub async fn from_config(
        config: &InsightConfig,
        primary: Provider,
        cache: Option<Arc<ResponseCache>>,
    ) -> Self {
        let manager = Self::new();

        let mut order = vec![primary];
        for fallback in &config.fallback_providers {
            if !order.contains(fallback) {
                order.push(*fallback);
            }
        }

        for provider in &order {
            match build_client(config, *provider) {
                Ok(client) => {
                    let client = match &cache {
                        Some(cache) => Arc::new(CachedClient::new(client, Arc::clone(cache)))
                            as Arc<dyn ProviderClient>,
                        None => client,
                    };
                    manager.register_provider(client).await;
                }
                Err(e) => debug!("Skipping provider {}: {}", provider, e),
            }
        }

        manager.set_order(order).await;
        manager
    }

    pub async fn register_provider(&self, client: Arc<dyn ProviderClient>) {
        let provider = client.get_provider();
        debug!("Registering provider: {}", provider);

        self.providers.write().await.insert(provider, client);
        self.health
            .write()
            .await
            .insert(provider, ProviderHealth::new(provider));

        let mut order = self.order.write().await;
        if !order.contains(&provider) {
            order.push(provider);
        }
    }

    pub async fn set_order(&self, order: Vec<Provider>) {
        *self.order.write().await = order;
    }

    pub async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        let order = self.order.read().await.clone();
        let mut last_error = None;

        for provider in order {
            let Some(client) = self.get_provider_client_ref(provider).await else {
                continue;
            };

            let start_time = Instant::now();
            match client.chat_completion(request).await {
                Ok(response) => {
                    self.update_health(provider, true, start_time.elapsed()).await;
                    return Ok(response);
                }
                Err(e) => {
                    self.update_health(provider, false, start_time.elapsed()).await;
                    warn!("Provider {} failed: {}", provider, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(InsightError::provider(format!("All providers failed: {}", e))),
            None => Err(InsightError::provider("No providers configured")),
        }
    }

    async fn get_provider_client_ref(&self, provider: Provider) -> Option<Arc<dyn ProviderClient>> {
        self.providers.read().await.get(&provider).cloned()
    }

    async fn update_health(&self, provider: Provider, is_healthy: bool, response_time: Duration) {
        let mut health = self.health.write().await;

        if let Some(provider_health) = health.get_mut(&provider) {
            provider_health.is_healthy = is_healthy;
            provider_health.last_check = Instant::now();
            provider_health.response_time = response_time;

            // Exponential moving average
            let error_value = if is_healthy { 0.0 } else { 1.0 };
            provider_health.error_rate = provider_health.error_rate * 0.9 + error_value * 0.1;
        }
    }

    /// Registered providers in routing order.
    pub async fn list_providers(&self) -> Vec<Provider> {
        let providers = self.providers.read().await;
        self.order
            .read()
            .await
            .iter()
            .copied()
            .filter(|p| providers.contains_key(p))
            .collect()
    }

    pub async fn has_providers(&self) -> bool {
        !self.providers.read().await.is_empty()
    }

    pub async fn get_provider_status(&self) -> Vec<(Provider, ProviderHealth)> {
        let health = self.health.read().await;
        health.iter().map(|(p, h)| (*p, h.clone())).collect()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the HTTP client for one provider from its configuration section.
pub fn build_client(config: &InsightConfig, provider: Provider) -> InsightResult<Arc<dyn ProviderClient>> {
    let section = config.providers.get(provider);
    let client: Arc<dyn ProviderClient> = match provider {
        Provider::Gemini => Arc::new(gemini::GeminiClient::from_config(section)?),
        Provider::Claude => Arc::new(claude::ClaudeClient::from_config(section)?),
        Provider::OpenAI => Arc::new(openai::OpenAIClient::from_config(section)?),
    };
    info!("Configured provider {} ({})", provider, client.get_default_model());
    Ok(client)
}

/// Tool results are fed back as text; JSON payloads are parsed back when the
/// provider wants structured content.
pub(crate) fn tool_content_value(content: &str) -> serde_json::Value {
    serde_json::from_str(content).unwrap_or_else(|_| serde_json::Value::String(content.to_string()))
}
