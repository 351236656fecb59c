use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Backend, InsightConfig};
use crate::providers::Provider;

pub mod commands;
pub mod repl;

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Blockchain data assistant backed by the thirdweb Insight API")]
#[command(long_about = "Ask questions about wallets, tokens, prices, transactions and contracts. \
An LLM plans which blockchain data and web search tools to call and summarises the results.")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        options: ChatOptions,
    },

    /// Ask a single question and print the answer
    Ask {
        /// Question to ask
        question: String,

        #[command(flatten)]
        options: ChatOptions,
    },

    /// Start the REST API server
    Server {
        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List the tools available to the assistant
    Tools,

    /// Show which API keys are configured
    Keys,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (keys omitted)
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatOptions {
    /// Conversation thread; each thread keeps its own memory
    #[arg(long, default_value = "cli")]
    pub thread: String,

    /// Source of blockchain answers (insight, nebula)
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Primary LLM provider (gemini, claude, openai)
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Model for the primary provider
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub temperature: Option<f32>,

    /// Chain queried by the blockchain data tools
    #[arg(long)]
    pub chain_id: Option<u64>,
}

impl ChatOptions {
    /// Command line flags win over file and environment values.
    pub fn apply(&self, config: &mut InsightConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(provider) = self.provider {
            config.default_provider = provider;
            config.fallback_providers.retain(|fallback| *fallback != provider);
        }
        if let Some(model) = &self.model {
            config.providers.get_mut(config.default_provider).model = Some(model.clone());
        }
        if let Some(temperature) = self.temperature {
            config.reasoning.temperature = temperature;
        }
        if let Some(chain_id) = self.chain_id {
            config.insight.chain_id = chain_id;
        }
    }
}
