use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::{Backend, InsightConfig};
use crate::error::{InsightError, InsightResult};
use crate::providers::{ChatMessage, ChatRequest, ProviderManager, ToolCall};
use crate::tools::ToolRegistry;
use crate::wallets::WalletBook;

pub const SYSTEM_PROMPT: &str = r#"You have tools that retrieve real-time blockchain data. Never guess blockchain information; always use the tools.

Token addresses:
- The blockchain data tools do not recognise tokens by name or ticker. When a token address has not been given, use the web search tool to find it before calling any other tool.
- Example: "What is the price of ETH?" -> search for the ETH token address -> query the price with that address.

JSON handling:
- Whenever a tool returns JSON, use the JSON tools (extract_json_value, count_json_list) to pull out the values you need, for example to count the ERC20 tokens held by an address.
- Do not read values out of JSON by eye. If you are unsure of the structure, inspect it with the JSON tools first.
- ERC20 balances are raw integer amounts in the token's smallest unit. Divide by 10 to the power of the token's decimals to get the real amount.

Multi-step queries:
- Search for a token by name -> find its address -> query the blockchain data tools.
- Look up an address's transactions -> search for documentation about the contracts involved.
- Fetch ERC20 holdings -> extract the balances with the JSON tools -> convert them using the token decimals.

Use web search when a token address is unknown, when the blockchain data tools do not return enough information (contract details, market data), and to enrich on-chain data from external sources.

Aim for accuracy and completeness. Combine blockchain data with external sources when needed."#;

pub const NEBULA_SYSTEM_PROMPT: &str = "You have access to Nebula, a language model trained on the blockchain with access to real-time data. \
When the user asks a blockchain-related question, use Nebula's 'chat' tool to answer it. \
When you answer, state the key points and do not say 'In summary'. \
If the query has a single answer, provide only that answer. \
If the user's query does not relate to blockchain, you do not have to call this tool. \
If Nebula cannot answer a blockchain question, say so; do not attempt to answer it yourself.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub name: String,
    pub status: ToolStatus,
}

/// Emitted while a turn runs, for callers that show intermediate steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasoningEvent {
    /// The model requested these tools, in call order
    ToolCalls { step: usize, names: Vec<String> },
    ToolFinished(ToolUsage),
}

#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub answer: String,
    /// Messages produced by this turn, starting with the user message
    pub messages: Vec<ChatMessage>,
    pub tools_used: Vec<ToolUsage>,
    pub steps: usize,
}

/// Iterative tool-calling loop: ask the model, run the tools it requests,
/// feed the results back, until it answers without tool calls.
pub struct ReasoningChain {
    providers: Arc<ProviderManager>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_steps: usize,
    temperature: f32,
    max_tokens: u32,
}

impl ReasoningChain {
    pub fn new(providers: Arc<ProviderManager>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            providers,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_steps: 10,
            temperature: 0.0,
            max_tokens: 2048,
        }
    }

    pub fn from_config(config: &InsightConfig, providers: Arc<ProviderManager>, tools: Arc<ToolRegistry>) -> Self {
        let prompt = match config.backend {
            Backend::Insight => SYSTEM_PROMPT,
            Backend::Nebula => NEBULA_SYSTEM_PROMPT,
        };

        Self::new(providers, tools)
            .with_system_prompt(prompt)
            .with_max_steps(config.reasoning.max_steps)
            .with_sampling(config.reasoning.temperature, config.reasoning.max_tokens)
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn providers(&self) -> &Arc<ProviderManager> {
        &self.providers
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// `history` is the earlier transcript of the conversation without a
    /// system prompt. When `wallets` is given, addresses from the user
    /// message override what the model writes into address arguments.
    pub async fn run(
        &self,
        history: &[ChatMessage],
        message: &str,
        wallets: Option<&WalletBook>,
    ) -> InsightResult<ReasoningOutcome> {
        self.run_with_progress(history, message, wallets, None).await
    }

    /// Like [`run`](Self::run), reporting each tool round on `progress`.
    /// A closed receiver is ignored.
    pub async fn run_with_progress(
        &self,
        history: &[ChatMessage],
        message: &str,
        wallets: Option<&WalletBook>,
        progress: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> InsightResult<ReasoningOutcome> {
        let emit = |event: ReasoningEvent| {
            if let Some(sender) = progress {
                let _ = sender.send(event);
            }
        };

        let definitions = self.tools.get_tool_definitions();

        let mut transcript = Vec::with_capacity(history.len() + 2);
        transcript.push(ChatMessage::system(self.system_prompt.clone()));
        transcript.extend_from_slice(history);
        transcript.push(ChatMessage::user(message));

        let mut produced = vec![ChatMessage::user(message)];
        let mut tools_used = Vec::new();

        for step in 1..=self.max_steps {
            let request = ChatRequest {
                messages: transcript.clone(),
                tools: definitions.clone(),
                tool_choice: None,
                model: None,
                temperature: Some(self.temperature),
                max_tokens: Some(self.max_tokens),
            };

            let response = self.providers.chat_completion(&request).await?;

            if !response.has_tool_calls() {
                let answer = match wallets {
                    Some(book) => book.render(&response.content),
                    None => response.content,
                };
                info!("Reasoning finished after {} step(s), {} tool call(s)", step, tools_used.len());

                produced.push(ChatMessage::assistant(answer.clone()));
                return Ok(ReasoningOutcome {
                    answer,
                    messages: produced,
                    tools_used,
                    steps: step,
                });
            }

            let mut calls = response.tool_calls;
            if let Some(book) = wallets {
                if book.inject(&mut calls) {
                    debug!("Injected wallet arguments into {}", calls[0].name);
                }
            }

            emit(ReasoningEvent::ToolCalls {
                step,
                names: calls.iter().map(|call| call.name.clone()).collect(),
            });

            let assistant = ChatMessage::assistant_with_tools(response.content, calls.clone());
            transcript.push(assistant.clone());
            produced.push(assistant);

            for (call, message, usage) in self.execute_calls(&calls).await {
                debug!("Tool {} finished: {:?}", call.name, usage.status);
                transcript.push(message.clone());
                produced.push(message);
                emit(ReasoningEvent::ToolFinished(usage.clone()));
                tools_used.push(usage);
            }
        }

        Err(InsightError::provider(format!(
            "Reasoning did not finish within {} steps",
            self.max_steps
        )))
    }

    // Calls run concurrently; results keep the order the model asked for.
    async fn execute_calls<'a>(&self, calls: &'a [ToolCall]) -> Vec<(&'a ToolCall, ChatMessage, ToolUsage)> {
        let results = join_all(
            calls
                .iter()
                .map(|call| self.tools.execute(&call.name, call.arguments.clone())),
        )
        .await;

        calls
            .iter()
            .zip(results)
            .map(|(call, result)| {
                let (content, status) = match result {
                    Ok(Value::String(text)) => (text, ToolStatus::Success),
                    Ok(value) => (value.to_string(), ToolStatus::Success),
                    Err(e) => {
                        warn!("Tool {} failed: {}", call.name, e);
                        (format!("Error: {}", e), ToolStatus::Error)
                    }
                };
                let usage = ToolUsage {
                    name: call.name.clone(),
                    status,
                };
                (call, ChatMessage::tool(call, content), usage)
            })
            .collect()
    }
}
