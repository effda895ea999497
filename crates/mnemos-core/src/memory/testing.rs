//! Test doubles shared by the engine's unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::embedding::HashingEmbedder;
use super::long_term::LongTermMemory;
use super::store::InMemoryVectorStore;
use super::traits::VectorStore;
use crate::error::{Error, Result};
use crate::types::{LongTermEntry, Metadata, StoreFilter};

pub(crate) const TEST_DIMENSION: usize = 64;

/// In-memory vector store with switchable failures and a search counter.
pub(crate) struct FlakyVectorStore {
    pub inner: InMemoryVectorStore,
    pub fail_add: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_search: AtomicBool,
    pub searches: AtomicUsize,
}

impl FlakyVectorStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryVectorStore::new(TEST_DIMENSION),
            fail_add: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_search: AtomicBool::new(false),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Insert an entry with a chosen timestamp, embedding the text.
    pub async fn seed(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Metadata,
        created_at: DateTime<Utc>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let embedding = HashingEmbedder::new(TEST_DIMENSION).unwrap().embed(text);
        self.inner
            .insert(LongTermEntry {
                id: id.clone(),
                owner_id: owner_id.to_string(),
                text: text.to_string(),
                metadata,
                embedding,
                created_at,
                score: None,
            })
            .await
            .unwrap();
        id
    }
}

#[async_trait]
impl VectorStore for FlakyVectorStore {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn add(&self, owner_id: &str, text: &str, metadata: Metadata, vector: Vec<f32>) -> Result<String> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::adapter_unavailable("vector store", "add refused"));
        }
        self.inner.add(owner_id, text, metadata, vector).await
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Error::adapter_unavailable("vector store", "search refused"));
        }
        self.inner.search(vector, top_k, filter, min_score).await
    }

    async fn export_all(&self) -> Result<Vec<LongTermEntry>> {
        self.inner.export_all().await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::adapter_unavailable("vector store", "delete refused"));
        }
        self.inner.delete(ids).await
    }
}

pub(crate) fn long_term(store: Arc<FlakyVectorStore>) -> LongTermMemory {
    LongTermMemory::new(store, Arc::new(HashingEmbedder::new(TEST_DIMENSION).unwrap())).unwrap()
}

pub(crate) fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap_or_default()
}
