//! # Insight - blockchain data assistant
//!
//! Answers natural-language questions about wallets, tokens, prices,
//! transactions and contracts. A small classifier model decides the user's
//! intent; a reasoning model then plans calls to the thirdweb Insight API,
//! JSON helpers and web search until it can answer.
//!
//! ## Features
//!
//! - **Multi-Provider LLMs**: Gemini, Claude and OpenAI with ordered fallback
//! - **Tool Calling**: native tool use on every provider
//! - **Nebula Backend**: optionally delegate blockchain questions to thirdweb Nebula
//! - **Wallet Injection**: addresses in the user's message override model-written arguments
//! - **Per-User Memory**: conversations kept per user id for the process lifetime
//! - **REST API and REPL**: axum server and an interactive terminal chat
//!
//! ## Usage
//!
//! ```rust,no_run
//! use insight::{Assistant, InsightConfig};
//!
//! #[tokio::main]
//! async fn main() -> insight::InsightResult<()> {
//!     let mut config = InsightConfig::default();
//!     config.apply_env(|key| std::env::var(key).ok())?;
//!
//!     let assistant = Assistant::from_config(&config).await;
//!     let reply = assistant
//!         .respond("alice", "How many ERC20 tokens does 0xC22166664e820cdA6bf4cedBdbb4fa1E6A84C440 hold?")
//!         .await?;
//!     println!("{}", reply.response);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod assistant;
pub mod cache;
pub mod chains;
pub mod cli;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod wallets;

// Re-export commonly used types
pub use api::{start_api_server, ApiServer};
pub use assistant::{Assistant, AssistantReply};
pub use chains::{Intent, IntentClassifier, ReasoningChain};
pub use config::{Backend, ConfigManager, InsightConfig};
pub use error::{InsightError, InsightResult};
pub use providers::{ChatRequest, ChatResponse, Provider, ProviderManager};
pub use session::{SessionStore, Turn};
pub use tools::{Tool, ToolRegistry};
pub use wallets::WalletBook;

/// The current version of Insight
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
