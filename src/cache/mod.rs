//! In-memory memoization of LLM responses.
//!
//! Entries live until [`ResponseCache::clear`] or process exit; there is no
//! eviction or expiry. Only successful responses are stored.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::InsightResult;
use crate::providers::{ChatRequest, ChatResponse, Provider, ProviderClient};

pub struct ResponseCache {
    entries: RwLock<HashMap<String, ChatResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Hex SHA-256 over provider, model and the serialized request.
    pub fn fingerprint(provider: Provider, model: &str, request: &ChatRequest) -> InsightResult<String> {
        let body = serde_json::to_vec(request)?;

        let mut hasher = Sha256::new();
        hasher.update(provider.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(&body);

        Ok(hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, key: &str) -> Option<ChatResponse> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: String, response: ChatResponse) {
        self.entries.write().await.insert(key, response);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a provider so identical requests are answered from the cache.
pub struct CachedClient {
    inner: Arc<dyn ProviderClient>,
    cache: Arc<ResponseCache>,
}

impl CachedClient {
    pub fn new(inner: Arc<dyn ProviderClient>, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ProviderClient for CachedClient {
    async fn chat_completion(&self, request: &ChatRequest) -> InsightResult<ChatResponse> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(self.inner.get_default_model());
        let key = ResponseCache::fingerprint(self.inner.get_provider(), model, request)?;

        if let Some(hit) = self.cache.get(&key).await {
            debug!("Cache hit for {} request {}", self.inner.get_provider(), &key[..12]);
            return Ok(hit);
        }

        let response = self.inner.chat_completion(request).await?;
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    fn get_provider(&self) -> Provider {
        self.inner.get_provider()
    }

    fn get_default_model(&self) -> &str {
        self.inner.get_default_model()
    }
}
