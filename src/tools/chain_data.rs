//! Blockchain data tools backed by the thirdweb Insight REST API.
//!
//! Every tool issues one authenticated GET and hands the JSON body back to
//! the model untouched; the JSON helpers in [`super::json`] pick values out.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{required_str, Tool};
use crate::config::InsightApiConfig;
use crate::error::{InsightError, InsightResult};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

pub struct InsightClient {
    client: Client,
    base_url: String,
    secret_key: Option<String>,
    chain_id: u64,
}

impl InsightClient {
    pub fn from_config(config: &InsightApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
            chain_id: config.chain_id,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Build `{base}/{segments..}?chain={id}&{query..}`. Segments are
    /// percent-encoded individually.
    pub fn build_url(&self, segments: &[&str], query: &[(&str, String)]) -> InsightResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| InsightError::config(format!("Invalid Insight base URL '{}': {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| InsightError::config(format!("Insight base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("chain", &self.chain_id.to_string());
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    pub async fn get(&self, segments: &[&str], query: &[(&str, String)]) -> InsightResult<Value> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| InsightError::config("THIRDWEB_SECRET_KEY environment variable not set"))?;

        let url = self.build_url(segments, query)?;
        debug!("Querying Insight: {}", url);

        let response = self
            .client
            .get(url)
            .header("x-secret-key", secret_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Insight API error {}: {}", status, body);
            return Err(InsightError::tool(format!(
                "Insight API returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightEndpoint {
    Erc20Tokens,
    Erc721Tokens,
    Erc1155Tokens,
    TokenPrices,
    Resolve,
    WalletTransactions,
    ContractEvents,
    ContractMetadata,
}

impl InsightEndpoint {
    pub const ALL: [InsightEndpoint; 8] = [
        InsightEndpoint::Erc20Tokens,
        InsightEndpoint::Erc721Tokens,
        InsightEndpoint::Erc1155Tokens,
        InsightEndpoint::TokenPrices,
        InsightEndpoint::Resolve,
        InsightEndpoint::WalletTransactions,
        InsightEndpoint::ContractEvents,
        InsightEndpoint::ContractMetadata,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InsightEndpoint::Erc20Tokens => "get_erc20_tokens",
            InsightEndpoint::Erc721Tokens => "get_erc721_tokens",
            InsightEndpoint::Erc1155Tokens => "get_erc1155_tokens",
            InsightEndpoint::TokenPrices => "get_token_prices",
            InsightEndpoint::Resolve => "resolve",
            InsightEndpoint::WalletTransactions => "get_wallet_transactions",
            InsightEndpoint::ContractEvents => "get_contract_events",
            InsightEndpoint::ContractMetadata => "get_contract_metadata",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InsightEndpoint::Erc20Tokens => {
                "Get the ERC20 token balances held by a wallet. Balances are raw integer amounts in the token's smallest unit."
            }
            InsightEndpoint::Erc721Tokens => "Get the ERC721 NFTs held by a wallet.",
            InsightEndpoint::Erc1155Tokens => "Get the ERC1155 tokens held by a wallet.",
            InsightEndpoint::TokenPrices => "Get current USD prices for one or more token contract addresses.",
            InsightEndpoint::Resolve => {
                "Resolve an address, ENS name, transaction hash or block number and describe what it refers to."
            }
            InsightEndpoint::WalletTransactions => "Get the most recent transactions sent or received by a wallet.",
            InsightEndpoint::ContractEvents => "Get the most recent events emitted by a contract.",
            InsightEndpoint::ContractMetadata => "Get the metadata and ABI of a contract.",
        }
    }

    pub fn parameters_schema(&self) -> Value {
        let limit = json!({
            "type": "integer",
            "description": format!("Maximum number of results (1-{}, default {})", MAX_LIMIT, DEFAULT_LIMIT),
        });

        match self {
            InsightEndpoint::Erc20Tokens | InsightEndpoint::Erc721Tokens | InsightEndpoint::Erc1155Tokens => json!({
                "type": "object",
                "properties": {
                    "owner_address": { "type": "string", "description": "Wallet address or ENS name" }
                },
                "required": ["owner_address"]
            }),
            InsightEndpoint::TokenPrices => json!({
                "type": "object",
                "properties": {
                    "token_addresses": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Token contract addresses"
                    }
                },
                "required": ["token_addresses"]
            }),
            InsightEndpoint::Resolve => json!({
                "type": "object",
                "properties": {
                    "input_data": {
                        "type": "string",
                        "description": "Address, ENS name, transaction hash or block number"
                    }
                },
                "required": ["input_data"]
            }),
            InsightEndpoint::WalletTransactions => json!({
                "type": "object",
                "properties": {
                    "wallet_address": { "type": "string", "description": "Wallet address" },
                    "limit": limit
                },
                "required": ["wallet_address"]
            }),
            InsightEndpoint::ContractEvents => json!({
                "type": "object",
                "properties": {
                    "contract_address": { "type": "string", "description": "Contract address" },
                    "limit": limit
                },
                "required": ["contract_address"]
            }),
            InsightEndpoint::ContractMetadata => json!({
                "type": "object",
                "properties": {
                    "contract_address": { "type": "string", "description": "Contract address" }
                },
                "required": ["contract_address"]
            }),
        }
    }

    /// Path segments and extra query parameters for a call.
    pub fn request(&self, args: &Value) -> InsightResult<(Vec<String>, Vec<(&'static str, String)>)> {
        let request = match self {
            InsightEndpoint::Erc20Tokens => (path(&["v1", "tokens", "erc20", required_str(args, "owner_address")?]), vec![]),
            InsightEndpoint::Erc721Tokens => (path(&["v1", "tokens", "erc721", required_str(args, "owner_address")?]), vec![]),
            InsightEndpoint::Erc1155Tokens => {
                (path(&["v1", "tokens", "erc1155", required_str(args, "owner_address")?]), vec![])
            }
            InsightEndpoint::TokenPrices => {
                let addresses = token_addresses(args)?;
                let query = addresses.into_iter().map(|address| ("address", address)).collect();
                (path(&["v1", "tokens", "price"]), query)
            }
            InsightEndpoint::Resolve => (path(&["v1", "resolve", required_str(args, "input_data")?]), vec![]),
            InsightEndpoint::WalletTransactions => (
                path(&["v1", "wallets", required_str(args, "wallet_address")?, "transactions"]),
                vec![("limit", limit(args).to_string())],
            ),
            InsightEndpoint::ContractEvents => (
                path(&["v1", "events", required_str(args, "contract_address")?]),
                vec![("limit", limit(args).to_string())],
            ),
            InsightEndpoint::ContractMetadata => (
                path(&["v1", "contracts", "metadata", required_str(args, "contract_address")?]),
                vec![],
            ),
        };
        Ok(request)
    }
}

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|segment| segment.trim().to_string()).collect()
}

fn limit(args: &Value) -> u64 {
    args.get("limit")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT)
}

// Models sometimes send a single string where a list is expected.
fn token_addresses(args: &Value) -> InsightResult<Vec<String>> {
    let addresses: Vec<String> = match args.get("token_addresses") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect(),
        Some(Value::String(address)) => address
            .split(',')
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    if addresses.is_empty() {
        return Err(InsightError::invalid_input("Missing required argument 'token_addresses'"));
    }
    Ok(addresses)
}

pub struct ChainDataTool {
    client: Arc<InsightClient>,
    endpoint: InsightEndpoint,
}

impl ChainDataTool {
    pub fn new(client: Arc<InsightClient>, endpoint: InsightEndpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Tool for ChainDataTool {
    fn name(&self) -> &str {
        self.endpoint.name()
    }

    fn description(&self) -> &str {
        self.endpoint.description()
    }

    fn parameters_schema(&self) -> Value {
        self.endpoint.parameters_schema()
    }

    async fn execute(&self, args: Value) -> InsightResult<Value> {
        let (segments, query) = self.endpoint.request(&args)?;
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        self.client.get(&segments, &query).await
    }
}
