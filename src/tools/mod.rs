use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{Backend, InsightConfig};
use crate::error::{InsightError, InsightResult};
use crate::providers::ToolDefinition;

pub mod chain_data;
pub mod json;
pub mod nebula;
pub mod web_search;

pub use chain_data::{ChainDataTool, InsightClient, InsightEndpoint};
pub use json::{CountJsonListTool, ExtractJsonValueTool};
pub use nebula::{NebulaClient, NebulaTool};
pub use web_search::{WebSearchClient, WebSearchTool};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> InsightResult<Value>;
}

/// Tools the reasoning chain may call, in registration order.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The Insight backend gets the blockchain data tools plus web search;
    /// the Nebula backend gets Nebula's `chat` tool. Both get the JSON helpers.
    pub fn with_default_tools(config: &InsightConfig) -> Self {
        let mut registry = Self::new();

        match config.backend {
            Backend::Insight => {
                let insight = Arc::new(InsightClient::from_config(&config.insight));
                for endpoint in InsightEndpoint::ALL {
                    registry.register(Arc::new(ChainDataTool::new(Arc::clone(&insight), endpoint)));
                }
            }
            Backend::Nebula => {
                let client = NebulaClient::from_config(&config.nebula, config.insight.chain_id);
                registry.register(Arc::new(NebulaTool::new(client)));
            }
        }

        registry.register(Arc::new(ExtractJsonValueTool));
        registry.register(Arc::new(CountJsonListTool));

        if config.backend == Backend::Insight {
            registry.register(Arc::new(WebSearchTool::new(WebSearchClient::from_config(&config.search))));
        }

        registry
    }

    /// Replaces any tool already registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> InsightResult<Value> {
        match self.tools.iter().find(|tool| tool.name() == name) {
            Some(tool) => tool.execute(args).await,
            None => Err(InsightError::not_found(format!("Tool '{}' not found", name))),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name().to_string()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|tool| tool.name() == name)
    }

    pub fn list_tools(&self) -> Vec<(&str, &str)> {
        self.tools.iter().map(|tool| (tool.name(), tool.description())).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> InsightResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| InsightError::invalid_input(format!("Missing required argument '{}'", key)))
}
