//! In-process adapter implementations.
//!
//! Interchangeable with networked stores behind the same traits; chosen at
//! construction time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::similarity::cosine_similarity;
use super::traits::{ShortTermStore, VectorStore};
use crate::error::{Error, Result};
use crate::types::{LongTermEntry, Metadata, ShortTermEntry, StoreFilter};

// ─────────────────────────────────────────────────────────────────────────────
// Short-term
// ─────────────────────────────────────────────────────────────────────────────

/// Session → key → entry map with a TTL.
///
/// Expiry is checked on every read, so an entry is absent as soon as it ages
/// out; `cleanup_expired` only reclaims the memory.
pub struct InMemoryShortTermStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, HashMap<String, ShortTermEntry>>>,
}

impl InMemoryShortTermStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// TTL in minutes; values beyond chrono's range saturate.
    pub fn with_ttl_minutes(minutes: i64) -> Self {
        Self::new(Duration::try_minutes(minutes).unwrap_or(Duration::MAX))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entries physically held, expired ones included.
    pub async fn stored_len(&self) -> usize {
        self.sessions.read().await.values().map(HashMap::len).sum()
    }
}

#[async_trait]
impl ShortTermStore for InMemoryShortTermStore {
    async fn set(&self, session_id: &str, key: &str, entry: ShortTermEntry) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<ShortTermEntry>> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|s| s.get(key))
            .filter(|e| !e.is_expired(self.ttl, now))
            .cloned())
    }

    async fn get_all(&self, session_id: &str) -> Result<HashMap<String, ShortTermEntry>> {
        let now = Utc::now();
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|s| {
                s.iter()
                    .filter(|(_, e)| !e.is_expired(self.ttl, now))
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let mut removed = 0;

        for entries in sessions.values_mut() {
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(self.ttl, now));
            removed += before - entries.len();
        }
        sessions.retain(|_, entries| !entries.is_empty());

        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Long-term
// ─────────────────────────────────────────────────────────────────────────────

/// Brute-force cosine vector store.
pub struct InMemoryVectorStore {
    dimension: usize,
    entries: RwLock<Vec<LongTermEntry>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Insert a fully-formed entry, keeping its id and timestamp.
    pub async fn insert(&self, entry: LongTermEntry) -> Result<()> {
        self.check_dimension(&entry.embedding)?;
        self.entries.write().await.push(entry);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::validation(format!(
                "vector has {} dimensions, store expects {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn add(&self, owner_id: &str, text: &str, metadata: Metadata, vector: Vec<f32>) -> Result<String> {
        self.check_dimension(&vector)?;
        let id = Uuid::new_v4().to_string();
        self.entries.write().await.push(LongTermEntry {
            id: id.clone(),
            owner_id: owner_id.to_string(),
            text: text.to_string(),
            metadata,
            embedding: vector,
            created_at: Utc::now(),
            score: None,
        });
        Ok(id)
    }

    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &StoreFilter,
        min_score: f32,
    ) -> Result<Vec<LongTermEntry>> {
        self.check_dimension(vector)?;
        let entries = self.entries.read().await;
        Ok(rank_by_similarity(entries.iter(), vector, top_k, filter, min_score))
    }

    async fn export_all(&self) -> Result<Vec<LongTermEntry>> {
        Ok(self.entries.read().await.clone())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !ids.contains(&e.id));
        Ok(before - entries.len())
    }
}

/// Score, filter and rank candidates against a query vector.
///
/// Ties keep insertion order.
pub(crate) fn rank_by_similarity<'a>(
    candidates: impl Iterator<Item = &'a LongTermEntry>,
    vector: &[f32],
    top_k: usize,
    filter: &StoreFilter,
    min_score: f32,
) -> Vec<LongTermEntry> {
    let mut scored: Vec<LongTermEntry> = candidates
        .filter(|e| filter.matches(e))
        .filter_map(|e| {
            let score = cosine_similarity(vector, &e.embedding);
            (score >= min_score).then(|| LongTermEntry {
                score: Some(score),
                ..e.clone()
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_short_term_set_get_overwrite() {
        let store = InMemoryShortTermStore::with_ttl_minutes(30);
        store.set("s1", "k", ShortTermEntry::new("s1", "k", "first")).await.unwrap();
        store.set("s1", "k", ShortTermEntry::new("s1", "k", "second")).await.unwrap();

        let entry = store.get("s1", "k").await.unwrap().unwrap();
        assert_eq!(entry.value, "second");
        assert!(store.get("s1", "missing").await.unwrap().is_none());
        assert!(store.get("s2", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent_before_sweep() {
        let store = InMemoryShortTermStore::with_ttl_minutes(30);
        let mut stale = ShortTermEntry::new("s1", "old", "stale value");
        stale.timestamp = Utc::now() - Duration::minutes(45);
        store.set("s1", "old", stale).await.unwrap();
        store.set("s1", "new", ShortTermEntry::new("s1", "new", "fresh")).await.unwrap();

        assert!(store.get("s1", "old").await.unwrap().is_none());
        let all = store.get_all("s1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("new"));
        // still physically present until swept
        assert_eq!(store.stored_len().await, 2);

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.stored_len().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_drops_empty_sessions() {
        let store = InMemoryShortTermStore::with_ttl_minutes(1);
        let mut stale = ShortTermEntry::new("s1", "k", "v");
        stale.timestamp = Utc::now() - Duration::minutes(5);
        store.set("s1", "k", stale).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.sessions.read().await.len(), 0);
    }

    #[tokio::test]
    async fn test_clear_session() {
        let store = InMemoryShortTermStore::with_ttl_minutes(30);
        store.set("s1", "a", ShortTermEntry::new("s1", "a", "1")).await.unwrap();
        store.set("s2", "a", ShortTermEntry::new("s2", "a", "2")).await.unwrap();
        store.clear("s1").await.unwrap();

        assert!(store.get_all("s1").await.unwrap().is_empty());
        assert_eq!(store.get_all("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_ranks_and_filters() {
        let store = InMemoryVectorStore::new(3);
        let a = store.add("u1", "a", Metadata::new(), unit(3, 0)).await.unwrap();
        let meta = json!({"conversation_id": "c1"}).as_object().cloned().unwrap();
        let b = store.add("u1", "b", meta, vec![0.8, 0.6, 0.0]).await.unwrap();
        store.add("u2", "c", Metadata::new(), unit(3, 0)).await.unwrap();
        store.add("u1", "d", Metadata::new(), unit(3, 2)).await.unwrap();

        let hits = store.search(&unit(3, 0), 10, &StoreFilter::owner("u1"), 0.3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec![a.clone(), b.clone()]);
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());

        let filter = StoreFilter::owner("u1").with_metadata("conversation_id", "c1");
        let hits = store.search(&unit(3, 0), 10, &filter, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, b);

        let hits = store.search(&unit(3, 0), 1, &StoreFilter::default(), 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_dimension_enforced() {
        let store = InMemoryVectorStore::new(3);
        let err = store.add("u1", "x", Metadata::new(), vec![1.0]).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_vector_delete_counts_existing() {
        let store = InMemoryVectorStore::new(2);
        let id = store.add("u1", "x", Metadata::new(), vec![1.0, 0.0]).await.unwrap();
        let deleted = store.delete(&[id, "missing".to_string()]).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().await);
    }
}
