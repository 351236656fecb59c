use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use super::{required_str, Tool};
use crate::config::SearchConfig;
use crate::error::{InsightError, InsightResult};

/// Exa neural search with highlights.
pub struct WebSearchClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    num_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u32,
    use_autoprompt: bool,
    contents: SearchContents,
}

#[derive(Debug, Serialize)]
struct SearchContents {
    highlights: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl WebSearchClient {
    pub fn from_config(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("insight/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            num_results: config.num_results,
        }
    }

    pub async fn search(&self, query: &str) -> InsightResult<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InsightError::invalid_input("Search query is empty"));
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| InsightError::config("EXA_API_KEY environment variable not set"))?;

        let url = format!("{}/search", self.base_url);
        debug!("Searching the web: {}", query);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .json(&SearchRequest {
                query,
                num_results: self.num_results,
                use_autoprompt: true,
                contents: SearchContents { highlights: true },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Web search error {}: {}", status, body);
            return Err(InsightError::tool(format!("Web search returned {}: {}", status.as_u16(), body)));
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload.results)
    }
}

/// Render one result as the source block the model is prompted with.
pub fn render_source(result: &SearchResult) -> String {
    let highlights = if result.highlights.is_empty() {
        "No highlights".to_string()
    } else {
        result.highlights.join(" ... ")
    };

    format!(
        "<source>\n    <url>{}</url>\n    <highlights>{}</highlights>\n</source>",
        result.url, highlights
    )
}

pub struct WebSearchTool {
    client: WebSearchClient,
}

impl WebSearchTool {
    pub fn new(client: WebSearchClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "retrieve_web_content"
    }

    fn description(&self) -> &str {
        "Searches the web and returns source URLs with highlighted passages. Use it to find token contract addresses by name or ticker and to enrich on-chain data."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        let query = required_str(&args, "query")?;
        let results = self.client.search(query).await?;
        Ok(json!(results.iter().map(render_source).collect::<Vec<_>>()))
    }
}
