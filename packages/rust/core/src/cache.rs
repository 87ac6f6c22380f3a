//! Response cache keyed by the exact (session, query text) pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rhassistant_shared::{AssistantError, ChatResponse, Result};
use rhassistant_storage::Storage;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Memoizes final responses. No normalization: case or whitespace variants miss.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, session_id: &str, query_text: &str) -> Result<Option<ChatResponse>>;

    async fn put(
        &self,
        session_id: &str,
        query_text: &str,
        response: &ChatResponse,
        ttl: Duration,
    ) -> Result<()>;
}

/// Stable key for a (session, query) pair.
pub fn cache_key(session_id: &str, query_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(query_text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Expiring cache in the libSQL database.
pub struct StorageCache {
    storage: Arc<Storage>,
}

impl StorageCache {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl ResponseCache for StorageCache {
    async fn get(&self, session_id: &str, query_text: &str) -> Result<Option<ChatResponse>> {
        let key = cache_key(session_id, query_text);
        match self.storage.get_cached_response(&key).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AssistantError::Storage(format!("corrupt cache entry: {e}"))),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        session_id: &str,
        query_text: &str,
        response: &ChatResponse,
        ttl: Duration,
    ) -> Result<()> {
        let json = serde_json::to_string(response)
            .map_err(|e| AssistantError::Storage(format!("unserializable response: {e}")))?;
        self.storage
            .set_cached_response(&cache_key(session_id, query_text), session_id, query_text, &json, ttl)
            .await
    }
}

/// In-process cache. Entries live as long as the process and ignore `ttl`.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, ChatResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, session_id: &str, query_text: &str) -> Result<Option<ChatResponse>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&cache_key(session_id, query_text)).cloned())
    }

    async fn put(
        &self,
        session_id: &str,
        query_text: &str,
        response: &ChatResponse,
        _ttl: Duration,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(cache_key(session_id, query_text), response.clone());
        Ok(())
    }
}
