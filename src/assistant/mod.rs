//! The conversation graph.
//!
//! ```text
//! message ─► intent ─┬─ query ──────► extract wallets ─► reasoning (with injection) ─┐
//!                    ├─ general ────────────────────────► reasoning ─────────────────┼─► reply
//!                    └─ transaction ─► read-only notice ──────────────────────────────┘
//! ```

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::chains::{Intent, IntentClassifier, ReasoningChain, ReasoningEvent, ToolUsage};
use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};
use crate::providers::{ChatMessage, ProviderManager};
use crate::session::{SessionStore, Turn};
use crate::tools::ToolRegistry;
use crate::wallets::WalletBook;

pub const TRANSACTION_NOTICE: &str = "I can look up on-chain data such as balances, prices, \
transactions and contract details, but I can't sign or submit transactions. Let me know what \
you'd like to look up instead.";

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub response: String,
    pub intent: Intent,
    pub tools_used: Vec<ToolUsage>,
    /// Conversation history including this exchange
    pub messages: Vec<Turn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphStatus {
    Available,
    Unavailable(String),
}

impl std::fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphStatus::Available => write!(f, "available"),
            GraphStatus::Unavailable(reason) => write!(f, "unavailable: {}", reason),
        }
    }
}

pub struct Assistant {
    intent: IntentClassifier,
    reasoning: ReasoningChain,
    sessions: Arc<SessionStore>,
}

impl Assistant {
    pub fn new(intent: IntentClassifier, reasoning: ReasoningChain, sessions: Arc<SessionStore>) -> Self {
        Self {
            intent,
            reasoning,
            sessions,
        }
    }

    pub async fn from_config(config: &InsightConfig) -> Self {
        let cache = config.reasoning.cache.then(|| Arc::new(ResponseCache::new()));

        let providers = Arc::new(
            ProviderManager::from_config(config, config.default_provider, cache.clone()).await,
        );
        let tools = Arc::new(ToolRegistry::with_default_tools(config));

        let intent = IntentClassifier::from_config(config, cache).await;
        let reasoning = ReasoningChain::from_config(config, providers, tools);

        Self::new(intent, reasoning, Arc::new(SessionStore::new()))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.reasoning.tools()
    }

    pub async fn status(&self) -> GraphStatus {
        if self.reasoning.providers().has_providers().await {
            GraphStatus::Available
        } else {
            GraphStatus::Unavailable("no LLM provider configured".to_string())
        }
    }

    /// Classification failures degrade to reasoning: with wallet injection
    /// when the message names an address, without otherwise.
    async fn detect_intent(&self, message: &str, wallets: &WalletBook) -> Intent {
        match self.intent.classify(message).await {
            Ok(intent) => intent,
            Err(e) => {
                let fallback = if wallets.is_empty() { Intent::General } else { Intent::Query };
                warn!("Intent detection failed, assuming {}: {}", fallback, e);
                fallback
            }
        }
    }

    pub async fn respond(&self, user_id: &str, message: &str) -> InsightResult<AssistantReply> {
        self.respond_with_progress(user_id, message, None).await
    }

    /// Like [`respond`](Self::respond), forwarding reasoning steps to `progress`.
    pub async fn respond_with_progress(
        &self,
        user_id: &str,
        message: &str,
        progress: Option<&UnboundedSender<ReasoningEvent>>,
    ) -> InsightResult<AssistantReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(InsightError::invalid_input("Message is required"));
        }

        let wallets = WalletBook::extract(message);
        let intent = self.detect_intent(message, &wallets).await;
        info!("User {} intent: {} ({} wallet(s))", user_id, intent, wallets.len());

        let (response, transcript, tools_used) = match intent {
            Intent::Transaction => (
                TRANSACTION_NOTICE.to_string(),
                vec![ChatMessage::user(message), ChatMessage::assistant(TRANSACTION_NOTICE)],
                Vec::new(),
            ),
            Intent::Query | Intent::General => {
                let history = self.sessions.transcript(user_id).await;
                let book = (intent == Intent::Query && !wallets.is_empty()).then_some(&wallets);
                let outcome = self
                    .reasoning
                    .run_with_progress(&history, message, book, progress)
                    .await?;
                (outcome.answer, outcome.messages, outcome.tools_used)
            }
        };

        let messages = self
            .sessions
            .record(
                user_id,
                vec![Turn::user(message), Turn::assistant(response.clone())],
                transcript,
            )
            .await;

        Ok(AssistantReply {
            response,
            intent,
            tools_used,
            messages,
        })
    }
}
