//! Long-term memory adapter: a vector store paired with an embedding provider.

use std::sync::Arc;

use tracing::debug;

use super::traits::{EmbeddingProvider, VectorStore};
use crate::error::{Error, Result};
use crate::types::{LongTermEntry, Metadata, StoreFilter};

/// Text-level access to the vector store.
///
/// Cheap to clone; clones share the same store and provider.
#[derive(Clone)]
pub struct LongTermMemory {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl LongTermMemory {
    /// Pair a store with a provider.
    ///
    /// Fails with a validation error if their dimensions disagree.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if store.dimension() != embedder.dimension() {
            return Err(Error::validation(format!(
                "embedding dimension mismatch: store expects {}, provider produces {}",
                store.dimension(),
                embedder.dimension()
            )));
        }
        Ok(Self { store, embedder })
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embedder.encode(text).await?;
        if vector.len() != self.dimension() {
            return Err(Error::Embedding(format!(
                "provider returned {} dimensions, expected {}",
                vector.len(),
                self.dimension()
            )));
        }
        Ok(vector)
    }

    /// Embed and insert `text`.
    pub async fn add(&self, owner_id: &str, text: &str, metadata: Metadata) -> Result<String> {
        let vector = self.encode(text).await?;
        self.add_with_vector(owner_id, text, metadata, vector).await
    }

    /// Insert with a vector the caller already computed.
    pub async fn add_with_vector(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Metadata,
        vector: Vec<f32>,
    ) -> Result<String> {
        let id = self.store.add(owner_id, text, metadata, vector).await?;
        debug!(owner_id = %owner_id, id = %id, "Stored long-term entry");
        Ok(id)
    }

    /// Embed `query` and search.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>> {
        let vector = self.encode(query).await?;
        self.search_vector(&vector, top_k, filter, min_score).await
    }

    pub async fn search_vector(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        self.store.search(vector, top_k, filter, min_score).await
    }

    pub async fn export_all(&self) -> Result<Vec<LongTermEntry>> {
        self.store.export_all().await
    }

    /// Every entry belonging to `owner_id`.
    pub async fn export_owner(&self, owner_id: &str) -> Result<Vec<LongTermEntry>> {
        let mut entries = self.store.export_all().await?;
        entries.retain(|e| e.owner_id == owner_id);
        Ok(entries)
    }

    pub async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete(ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HashingEmbedder, InMemoryVectorStore};

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let store = Arc::new(InMemoryVectorStore::new(8));
        let embedder = Arc::new(HashingEmbedder::new(16).unwrap());
        let err = LongTermMemory::new(store, embedder).err().unwrap();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_add_and_search_text() {
        let ltm = LongTermMemory::new(
            Arc::new(InMemoryVectorStore::new(64)),
            Arc::new(HashingEmbedder::new(64).unwrap()),
        )
        .unwrap();

        let id = ltm.add("u1", "User prefers dark mode", Metadata::new()).await.unwrap();
        let hits = ltm
            .search("dark mode", 5, &StoreFilter::owner("u1"), 0.1)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert!(ltm.search("dark mode", 5, &StoreFilter::owner("u2"), 0.1).await.unwrap().is_empty());
        assert!(ltm.search("dark mode", 0, &StoreFilter::owner("u1"), 0.1).await.unwrap().is_empty());
    }
}
