use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};
use crate::providers::{ChatMessage, ChatRequest, ChatResponse, ProviderManager, ToolDefinition};

const CLASSIFY_TOOL: &str = "classify_intent";

const INTENT_PROMPT: &str = "Determine the user's intent. The user may want to query the blockchain \
(look up balances, tokens, prices, transactions, contracts or addresses), submit a transaction, or \
have a general intent. General intents include questions about blockchains that do not require \
looking anything up.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Query,
    Transaction,
    General,
}

impl Intent {
    pub const ALL: [Intent; 3] = [Intent::Query, Intent::Transaction, Intent::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Query => "query",
            Intent::Transaction => "transaction",
            Intent::General => "general",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Intent {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "query" | "blockchain_query" => Ok(Intent::Query),
            "transaction" => Ok(Intent::Transaction),
            "general" => Ok(Intent::General),
            _ => Err(InsightError::invalid_input(format!("Unknown intent: {}", s))),
        }
    }
}

/// Classifies a user message with a forced `classify_intent` tool call, the
/// tool's single enum argument acting as structured output.
pub struct IntentClassifier {
    providers: Arc<ProviderManager>,
}

impl IntentClassifier {
    pub fn new(providers: Arc<ProviderManager>) -> Self {
        Self { providers }
    }

    /// The intent provider runs the configured intent model; the reasoning
    /// providers back it up when its key is missing or the call fails.
    pub async fn from_config(config: &InsightConfig, cache: Option<Arc<ResponseCache>>) -> Self {
        let mut intent_config = config.clone();
        intent_config
            .providers
            .get_mut(config.intent.provider)
            .model = Some(config.intent.model.clone());

        let mut fallbacks = vec![config.default_provider];
        fallbacks.extend(config.fallback_providers.iter().copied());
        intent_config.fallback_providers = fallbacks;

        let providers = ProviderManager::from_config(&intent_config, config.intent.provider, cache).await;
        Self::new(Arc::new(providers))
    }

    pub fn tool_definition() -> ToolDefinition {
        ToolDefinition {
            name: CLASSIFY_TOOL.to_string(),
            description: "Record the user's intent.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "intent": {
                        "type": "string",
                        "enum": Intent::ALL.iter().map(Intent::as_str).collect::<Vec<_>>(),
                        "description": "The user's intent."
                    }
                },
                "required": ["intent"]
            }),
        }
    }

    pub fn build_request(message: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![
                ChatMessage::system(INTENT_PROMPT),
                ChatMessage::user(format!("Message: {}", message)),
            ],
            tools: vec![Self::tool_definition()],
            tool_choice: Some(CLASSIFY_TOOL.to_string()),
            model: None,
            temperature: Some(0.0),
            max_tokens: Some(256),
        }
    }

    /// Reads the tool argument, falling back to the intent word in the text.
    /// Text naming no intent, or more than one distinct intent, is unclear.
    pub fn parse_response(response: &ChatResponse) -> Option<Intent> {
        let from_tool = response
            .tool_calls
            .iter()
            .filter(|call| call.name == CLASSIFY_TOOL)
            .find_map(|call| call.arguments.get("intent")?.as_str()?.parse().ok());

        if from_tool.is_some() {
            return from_tool;
        }

        let mut mentioned: Vec<Intent> = Vec::new();
        for intent in response
            .content
            .split(|c: char| !c.is_ascii_alphabetic() && c != '_')
            .filter_map(|word| word.parse::<Intent>().ok())
        {
            if !mentioned.contains(&intent) {
                mentioned.push(intent);
            }
        }

        match mentioned.as_slice() {
            [intent] => Some(*intent),
            _ => None,
        }
    }

    /// An unclear reply is an error so callers apply their own fallback.
    pub async fn classify(&self, message: &str) -> InsightResult<Intent> {
        let response = self.providers.chat_completion(&Self::build_request(message)).await?;
        let intent = Self::parse_response(&response).ok_or_else(|| {
            InsightError::provider(format!("No clear intent in classifier reply: {:?}", response.content))
        })?;
        debug!("Classified message as {} via {}", intent, response.provider);
        Ok(intent)
    }
}
