use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{ChatMessage, ChatRequest, ChatResponse, Provider, ProviderClient, Role, ToolCall, Usage};
use crate::config::ProviderConfig;
use crate::error::{InsightError, InsightResult};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ClaudeClient {
    pub fn from_config(config: &ProviderConfig) -> InsightResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| InsightError::provider("ANTHROPIC_API_KEY environment variable not set"))?;

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

    // System prompts travel separately; everything else becomes content blocks,
    // and adjacent messages with the same role are merged so roles alternate.
    fn convert_messages(messages: &[ChatMessage]) -> (String, Vec<Value>) {
        let mut system_prompt = String::new();
        let mut claude_messages: Vec<Value> = Vec::new();

        for message in messages {
            let (role, blocks) = match message.role {
                Role::System => {
                    if !system_prompt.is_empty() {
                        system_prompt.push('\n');
                    }
                    system_prompt.push_str(&message.content);
                    continue;
                }
                Role::User => ("user", text_blocks(&message.content)),
                Role::Assistant => {
                    let mut blocks = text_blocks(&message.content);
                    blocks.extend(message.tool_calls.iter().map(|call| {
                        json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        })
                    }));
                    ("assistant", blocks)
                }
                Role::Tool => (
                    "user",
                    vec![json!({
                        "type": "tool_result",
                        "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                        "content": message.content,
                    })],
                ),
            };

            if blocks.is_empty() {
                continue;
            }

            match claude_messages.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(content) = last["content"].as_array_mut() {
                        content.extend(blocks);
                    }
                }
                _ => claude_messages.push(json!({ "role": role, "content": blocks })),
            }
        }

        (system_prompt, claude_messages)
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let (system_prompt, messages) = Self::convert_messages(&request.messages);

        let mut payload = json!({
            "model": request.model.as_deref().unwrap_or(self.get_default_model()),
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(2048),
            "temperature": request.temperature.unwrap_or(0.0),
        });

        if !system_prompt.is_empty() {
            payload["system"] = json!(system_prompt);
        }

        if !request.tools.is_empty() {
            payload["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters,
                    })
                })
                .collect();
        }

        if let Some(name) = &request.tool_choice {
            payload["tool_choice"] = json!({ "type": "tool", "name": name });
        }

        payload
    }

    fn parse_response(&self, response_json: &Value) -> ChatResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response_json["content"].as_array().into_iter().flatten() {
            match block["type"].as_str() {
                Some("text") => content.push_str(block["text"].as_str().unwrap_or("")),
                Some("tool_use") => tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                }),
                _ => {}
            }
        }

        let usage = response_json.get("usage").map(|usage_data| {
            let input = usage_data["input_tokens"].as_u64().unwrap_or(0) as u32;
            let output = usage_data["output_tokens"].as_u64().unwrap_or(0) as u32;
            Usage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input + output,
            }
        });

        ChatResponse {
            content,
            tool_calls,
            model: response_json["model"]
                .as_str()
                .unwrap_or(self.get_default_model())
                .to_string(),
            provider: Provider::Claude,
            usage,
        }
    }
}

fn text_blocks(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![json!({ "type": "text", "text": text })]
    }
}

#[async_trait]
impl ProviderClient for ClaudeClient {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let payload = self.build_payload(request);

        debug!("Sending request to Claude: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Claude API error: {}", error_text);
            return Err(InsightError::provider(format!("Claude API error: {}", error_text)));
        }

        let response_json: Value = response.json().await?;
        Ok(self.parse_response(&response_json))
    }

    fn get_provider(&self) -> Provider {
        Provider::Claude
    }

    fn get_default_model(&self) -> &str {
        &self.model
    }
}
