//! Near-duplicate rejection before long-term insertion.

use tracing::info;

use super::long_term::LongTermMemory;
use super::similarity::text_entry_similarity;
use crate::error::Result;
use crate::types::{keys, StoreFilter};

/// Default similarity at or above which a candidate is a duplicate.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.95;

/// Default number of existing entries compared against.
pub const DEFAULT_DEDUP_TOP_N: usize = 3;

/// An existing entry that blocks insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub existing_id: String,
    pub similarity: f64,
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f64,
    top_n: usize,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_THRESHOLD, DEFAULT_DEDUP_TOP_N)
    }
}

impl Deduplicator {
    pub fn new(threshold: f64, top_n: usize) -> Self {
        Self { threshold, top_n }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find an existing entry in scope that `text` duplicates.
    ///
    /// Compares against the top-N semantic neighbours in search order and
    /// stops at the first one at or above the threshold. `vector` is the
    /// candidate's embedding if already computed.
    pub async fn find_duplicate(
        &self,
        ltm: &LongTermMemory,
        owner_id: &str,
        conversation_id: Option<&str>,
        text: &str,
        vector: &[f32],
    ) -> Result<Option<DuplicateMatch>> {
        let mut filter = StoreFilter::owner(owner_id);
        if let Some(conversation_id) = conversation_id {
            filter = filter.with_metadata(keys::CONVERSATION_ID, conversation_id);
        }

        let neighbours = ltm.search_vector(vector, self.top_n, &filter, 0.0).await?;

        for existing in neighbours {
            let similarity = text_entry_similarity(text, Some(vector), &existing);
            if similarity >= self.threshold {
                info!(
                    owner_id = %owner_id,
                    existing_id = %existing.id,
                    similarity = similarity,
                    "Similar entry found, skipping insert"
                );
                return Ok(Some(DuplicateMatch {
                    existing_id: existing.id,
                    similarity,
                }));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{HashingEmbedder, InMemoryVectorStore};
    use crate::types::Metadata;
    use std::sync::Arc;

    fn ltm() -> LongTermMemory {
        LongTermMemory::new(
            Arc::new(InMemoryVectorStore::new(128)),
            Arc::new(HashingEmbedder::new(128).unwrap()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_identical_text_is_duplicate() {
        let ltm = ltm();
        let id = ltm.add("u1", "I like pizza", Metadata::new()).await.unwrap();
        let vector = ltm.encode("I like pizza").await.unwrap();

        let dedup = Deduplicator::new(0.92, 3);
        let found = dedup
            .find_duplicate(&ltm, "u1", None, "I like pizza", &vector)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.existing_id, id);
        assert!(found.similarity >= 0.92);
    }

    #[tokio::test]
    async fn test_scope_limits_comparison() {
        let ltm = ltm();
        ltm.add("u1", "I like pizza", Metadata::new()).await.unwrap();
        let vector = ltm.encode("I like pizza").await.unwrap();
        let dedup = Deduplicator::default();

        // other owner
        assert!(dedup
            .find_duplicate(&ltm, "u2", None, "I like pizza", &vector)
            .await
            .unwrap()
            .is_none());

        // conversation scope that the existing entry lacks
        assert!(dedup
            .find_duplicate(&ltm, "u1", Some("conv-9"), "I like pizza", &vector)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_distinct_text_is_accepted() {
        let ltm = ltm();
        ltm.add("u1", "I like pizza", Metadata::new()).await.unwrap();
        let text = "Quarterly report is due on Friday";
        let vector = ltm.encode(text).await.unwrap();

        assert!(Deduplicator::default()
            .find_duplicate(&ltm, "u1", None, text, &vector)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_punctuation_only_text_is_duplicate() {
        let ltm = ltm();
        let id = ltm.add("u1", "???", Metadata::new()).await.unwrap();
        let vector = ltm.encode("???").await.unwrap();
        assert!(vector.iter().all(|x| *x == 0.0));

        let found = Deduplicator::default()
            .find_duplicate(&ltm, "u1", None, "???", &vector)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.existing_id, id);
        assert_eq!(found.similarity, 1.0);
    }
}
