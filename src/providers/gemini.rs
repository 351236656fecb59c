use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use super::{
    tool_content_value, ChatMessage, ChatRequest, ChatResponse, Provider, ProviderClient, Role, ToolCall, Usage,
};
use crate::config::ProviderConfig;
use crate::error::{InsightError, InsightResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Google Gemini over the `generateContent` REST endpoint.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn from_config(config: &ProviderConfig) -> InsightResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| InsightError::provider("GOOGLE_API_KEY environment variable not set"))?;

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

    // Gemini calls the assistant "model" and carries tool results as
    // functionResponse parts on the user side.
    fn convert_messages(messages: &[ChatMessage]) -> (String, Vec<Value>) {
        let mut system_prompt = String::new();
        let mut contents: Vec<Value> = Vec::new();

        for message in messages {
            let (role, parts) = match message.role {
                Role::System => {
                    if !system_prompt.is_empty() {
                        system_prompt.push('\n');
                    }
                    system_prompt.push_str(&message.content);
                    continue;
                }
                Role::User => ("user", text_parts(&message.content)),
                Role::Assistant => {
                    let mut parts = text_parts(&message.content);
                    parts.extend(message.tool_calls.iter().map(|call| {
                        json!({ "functionCall": { "name": call.name, "args": call.arguments } })
                    }));
                    ("model", parts)
                }
                Role::Tool => (
                    "user",
                    vec![json!({
                        "functionResponse": {
                            "name": message.name.clone().unwrap_or_default(),
                            "response": { "result": tool_content_value(&message.content) },
                        }
                    })],
                ),
            };

            if parts.is_empty() {
                continue;
            }

            match contents.last_mut() {
                Some(last) if last["role"] == role => {
                    if let Some(existing) = last["parts"].as_array_mut() {
                        existing.extend(parts);
                    }
                }
                _ => contents.push(json!({ "role": role, "parts": parts })),
            }
        }

        (system_prompt, contents)
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let (system_prompt, contents) = Self::convert_messages(&request.messages);

        let mut payload = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature.unwrap_or(0.0),
                "maxOutputTokens": request.max_tokens.unwrap_or(2048),
            },
        });

        if !system_prompt.is_empty() {
            payload["systemInstruction"] = json!({ "parts": [{ "text": system_prompt }] });
        }

        if !request.tools.is_empty() {
            let declarations: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            payload["tools"] = json!([{ "functionDeclarations": declarations }]);
        }

        if let Some(name) = &request.tool_choice {
            payload["toolConfig"] = json!({
                "functionCallingConfig": { "mode": "ANY", "allowedFunctionNames": [name] }
            });
        }

        payload
    }

    fn parse_response(&self, response_json: &Value) -> ChatResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        let parts = response_json["candidates"][0]["content"]["parts"].as_array();
        for part in parts.into_iter().flatten() {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                // Gemini does not assign call ids
                tool_calls.push(ToolCall {
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    name: call["name"].as_str().unwrap_or_default().to_string(),
                    arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
                });
            }
        }

        let usage = response_json.get("usageMetadata").map(|usage_data| Usage {
            prompt_tokens: usage_data["promptTokenCount"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["totalTokenCount"].as_u64().unwrap_or(0) as u32,
        });

        ChatResponse {
            content,
            tool_calls,
            model: response_json["modelVersion"]
                .as_str()
                .unwrap_or(self.get_default_model())
                .to_string(),
            provider: Provider::Gemini,
            usage,
        }
    }
}

fn text_parts(text: &str) -> Vec<Value> {
    if text.trim().is_empty() {
        Vec::new()
    } else {
        vec![json!({ "text": text })]
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        let model = request.model.as_deref().unwrap_or(self.get_default_model());
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let payload = self.build_payload(request);

        debug!("Sending request to Gemini: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini API error: {}", error_text);
            return Err(InsightError::provider(format!("Gemini API error: {}", error_text)));
        }

        let response_json: Value = response.json().await?;
        Ok(self.parse_response(&response_json))
    }

    fn get_provider(&self) -> Provider {
        Provider::Gemini
    }

    fn get_default_model(&self) -> &str {
        &self.model
    }
}
