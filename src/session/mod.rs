use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::providers::{ChatMessage, Role};

/// One visible exchange entry, as shown to users and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct Conversation {
    turns: Vec<Turn>,
    /// Full provider transcript including tool traffic, replayed as memory
    transcript: Vec<ChatMessage>,
}

/// Conversations keyed by user id, held in memory for the process lifetime.
#[derive(Debug, Default)]
pub struct SessionStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history(&self, user_id: &str) -> Vec<Turn> {
        self.conversations
            .read()
            .await
            .get(user_id)
            .map(|conversation| conversation.turns.clone())
            .unwrap_or_default()
    }

    pub async fn transcript(&self, user_id: &str) -> Vec<ChatMessage> {
        self.conversations
            .read()
            .await
            .get(user_id)
            .map(|conversation| conversation.transcript.clone())
            .unwrap_or_default()
    }

    /// Append a completed exchange. Returns the full history afterwards.
    pub async fn record(&self, user_id: &str, turns: Vec<Turn>, messages: Vec<ChatMessage>) -> Vec<Turn> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations.entry(user_id.to_string()).or_default();
        conversation.turns.extend(turns);
        conversation
            .transcript
            .extend(messages.into_iter().filter(|message| message.role != Role::System));
        conversation.turns.clone()
    }

    /// Returns whether the user had a conversation to clear.
    pub async fn clear(&self, user_id: &str) -> bool {
        self.conversations.write().await.remove(user_id).is_some()
    }

    pub async fn user_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}
