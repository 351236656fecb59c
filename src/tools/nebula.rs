//! thirdweb Nebula, a hosted blockchain-aware LLM exposed to the reasoning
//! model as a single `chat` tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use super::{required_str, Tool};
use crate::config::NebulaConfig;
use crate::error::{InsightError, InsightResult};

pub struct NebulaClient {
    client: Client,
    base_url: String,
    secret_key: Option<String>,
    chain_id: u64,
}

#[derive(Debug, Serialize)]
struct NebulaRequest<'a> {
    message: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    context: NebulaContext,
}

#[derive(Debug, Serialize)]
struct NebulaContext {
    chain_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NebulaReply {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl NebulaClient {
    pub fn from_config(config: &NebulaConfig, chain_id: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            chain_id,
        }
    }

    /// Passing the `session_id` of an earlier reply continues that Nebula session.
    pub async fn chat(&self, message: &str, session_id: Option<&str>) -> InsightResult<NebulaReply> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| InsightError::config("THIRDWEB_SECRET_KEY environment variable not set"))?;

        let url = format!("{}/chat", self.base_url);
        debug!("Asking Nebula on chain {}", self.chain_id);

        let response = self
            .client
            .post(&url)
            .header("x-secret-key", secret_key)
            .json(&NebulaRequest {
                message,
                stream: false,
                session_id,
                context: NebulaContext {
                    chain_ids: vec![self.chain_id.to_string()],
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Nebula API error {}: {}", status, body);
            return Err(InsightError::tool(format!("Nebula returned {}: {}", status.as_u16(), body)));
        }

        Ok(response.json().await?)
    }
}

pub struct NebulaTool {
    client: NebulaClient,
}

impl NebulaTool {
    pub fn new(client: NebulaClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for NebulaTool {
    fn name(&self) -> &str {
        "chat"
    }

    fn description(&self) -> &str {
        "Ask Nebula, a language model trained on blockchain data with access to real-time on-chain information. Send the user's blockchain question in plain language."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "Question for Nebula" },
                "session_id": {
                    "type": "string",
                    "description": "Session id from an earlier Nebula reply, to continue that conversation"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        let message = required_str(&args, "message")?;
        let session_id = args.get("session_id").and_then(Value::as_str).filter(|id| !id.is_empty());

        let reply = self.client.chat(message, session_id).await?;
        Ok(json!({ "message": reply.message, "session_id": reply.session_id }))
    }
}
