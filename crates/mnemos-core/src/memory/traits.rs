//! Adapter contracts the engine consumes.
//!
//! Each call is atomic from the engine's point of view; atomicity, network
//! timeouts and retries belong to the implementation, not the engine.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{LongTermEntry, Metadata, ShortTermEntry, StoreFilter};

/// Session-scoped ephemeral key/value store with a TTL.
#[async_trait]
pub trait ShortTermStore: Send + Sync {
    /// Store an entry, overwriting any entry with the same (session, key).
    async fn set(&self, session_id: &str, key: &str, entry: ShortTermEntry) -> Result<()>;

    /// Fetch a live entry. Expired entries are absent.
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<ShortTermEntry>>;

    /// All live entries of a session.
    async fn get_all(&self, session_id: &str) -> Result<HashMap<String, ShortTermEntry>>;

    /// Remove every entry of a session.
    async fn clear(&self, session_id: &str) -> Result<()>;

    /// Physically remove expired entries, returning how many were removed.
    ///
    /// Stores that expire natively return `Ok(0)`.
    async fn cleanup_expired(&self) -> Result<usize>;
}

/// External vector store holding long-term entries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Vector dimension this store was provisioned with.
    fn dimension(&self) -> usize;

    /// Insert a new entry and return its id.
    async fn add(&self, owner_id: &str, text: &str, metadata: Metadata, vector: Vec<f32>) -> Result<String>;

    /// Nearest entries to `vector`, best first, at or above `min_score`.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>>;

    /// Every stored entry, embeddings included.
    async fn export_all(&self) -> Result<Vec<LongTermEntry>>;

    /// Delete entries by id, returning how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;
}

/// Text to fixed-length vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.encode(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize;
}
