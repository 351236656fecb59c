use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderClient, Role, ToolCall, Usage};
use crate::config::ProviderConfig;
use crate::error::{InsightError, InsightResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn from_config(config: &ProviderConfig) -> InsightResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| InsightError::provider("OPENAI_API_KEY environment variable not set"))?;

        let mut client = Self::with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            client.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(model) = &config.model {
            client.model = model.clone();
        }
        Ok(client)
    }

    pub fn with_api_key(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn convert_message(message: &ChatMessage) -> Value {
        match message.role {
            Role::System => json!({ "role": "system", "content": message.content }),
            Role::User => json!({ "role": "user", "content": message.content }),
            Role::Assistant if message.tool_calls.is_empty() => {
                json!({ "role": "assistant", "content": message.content })
            }
            Role::Assistant => {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
                let content = if message.content.is_empty() {
                    Value::Null
                } else {
                    json!(message.content)
                };
                json!({ "role": "assistant", "content": content, "tool_calls": tool_calls })
            }
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                "content": message.content,
            }),
        }
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(Self::convert_message).collect();

        let mut payload = json!({
            "model": request.model.as_deref().unwrap_or(self.get_default_model()),
            "messages": messages,
            "temperature": request.temperature.unwrap_or(0.0),
            "max_tokens": request.max_tokens.unwrap_or(2048),
        });

        if !request.tools.is_empty() {
            payload["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect();
        }

        if let Some(name) = &request.tool_choice {
            payload["tool_choice"] = json!({ "type": "function", "function": { "name": name } });
        }

        payload
    }

    fn parse_response(&self, response_json: &Value) -> ChatResponse {
        let message = &response_json["choices"][0]["message"];

        let content = message["content"].as_str().unwrap_or("").to_string();

        let tool_calls = message["tool_calls"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|call| {
                let raw_arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
                ToolCall {
                    id: call["id"].as_str().unwrap_or_default().to_string(),
                    name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                    arguments: serde_json::from_str(raw_arguments)
                        .unwrap_or_else(|_| Value::String(raw_arguments.to_string())),
                }
            })
            .collect();

        let usage = response_json.get("usage").map(|usage_data| Usage {
            prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
        });

        ChatResponse {
            content,
            tool_calls,
            model: response_json["model"]
                .as_str()
                .unwrap_or(self.get_default_model())
                .to_string(),
            provider: Provider::OpenAI,
            usage,
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAIClient {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let payload = self.build_payload(request);

        debug!("Sending request to OpenAI: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenAI API error: {}", error_text);
            return Err(InsightError::provider(format!("OpenAI API error: {}", error_text)));
        }

        let response_json: Value = response.json().await?;
        Ok(self.parse_response(&response_json))
    }

    fn get_provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn get_default_model(&self) -> &str {
        &self.model
    }
}
