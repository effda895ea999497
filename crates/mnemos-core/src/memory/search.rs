//! Hybrid search over both memory tiers.
//!
//! Four modes share one filter set:
//! - Semantic: vector search on long-term storage, filters applied after
//! - Keyword: fraction of query tokens found in the candidate text
//! - Hybrid: both of the above merged by text on normalized rank
//! - Metadata: filtered scan with no ranking
//!
//! Hybrid scoring converts each ranking to `(N - i) / N` for the result at
//! position `i` of `N`, weights it per mode and sums the two when a text
//! appears in both rankings.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::long_term::LongTermMemory;
use super::similarity::tokenize;
use super::traits::ShortTermStore;
use crate::error::Result;
use crate::types::{keys, MemoryEntry, MemorySource, Metadata, StoreFilter};

/// Each mode fetches this many times the requested count before filtering.
pub const OVERFETCH_FACTOR: usize = 2;

/// Search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
    Metadata,
}

/// Mode weights for hybrid ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridWeights {
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

/// Search filters. All set conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub owner_id: Option<String>,
    /// Inclusive lower bound on creation time.
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on creation time.
    pub created_before: Option<DateTime<Utc>>,
    pub importance_min: Option<f64>,
    pub importance_max: Option<f64>,
    /// Matches the `type` metadata key.
    pub memory_type: Option<String>,
    /// Metadata equality conditions.
    pub metadata: Metadata,
    /// Restrict to one tier; both when unset.
    pub source: Option<MemorySource>,
    /// Session whose short-term entries are searched.
    pub session_id: Option<String>,
}

impl SearchFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_source(mut self, source: MemorySource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn created_between(mut self, after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self.created_before = Some(before);
        self
    }

    pub fn importance_between(mut self, min: f64, max: f64) -> Self {
        self.importance_min = Some(min);
        self.importance_max = Some(max);
        self
    }

    pub fn allows(&self, source: MemorySource) -> bool {
        self.source.is_none_or(|s| s == source)
    }

    pub fn matches(&self, entry: &MemoryEntry) -> bool {
        if !self.allows(entry.source) {
            return false;
        }
        if let Some(ref owner) = self.owner_id {
            if &entry.owner_id != owner {
                return false;
            }
        }
        if self.created_after.is_some_and(|after| entry.created_at < after) {
            return false;
        }
        if self.created_before.is_some_and(|before| entry.created_at > before) {
            return false;
        }
        if self.importance_min.is_some_and(|min| entry.importance < min) {
            return false;
        }
        if self.importance_max.is_some_and(|max| entry.importance > max) {
            return false;
        }
        if let Some(ref memory_type) = self.memory_type {
            if entry.metadata.get(keys::TYPE).and_then(Value::as_str) != Some(memory_type.as_str()) {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(key, value)| entry.metadata.get(key) == Some(value))
    }

    /// The subset a vector store can apply itself.
    pub fn store_filter(&self) -> StoreFilter {
        let mut filter = StoreFilter {
            owner_id: self.owner_id.clone(),
            metadata: self.metadata.clone(),
        };
        if let Some(ref memory_type) = self.memory_type {
            filter = filter.with_metadata(keys::TYPE, memory_type.as_str());
        }
        filter
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub entry: MemoryEntry,
    /// Final ranking score.
    pub score: f64,
    /// Semantic contribution (hybrid) or raw similarity (semantic).
    pub semantic_score: f64,
    /// Keyword contribution (hybrid) or raw overlap (keyword).
    pub keyword_score: f64,
}

impl SearchHit {
    fn unscored(entry: MemoryEntry) -> Self {
        Self {
            entry,
            score: 0.0,
            semantic_score: 0.0,
            keyword_score: 0.0,
        }
    }
}

/// Fraction of query tokens contained in some token of `text`.
///
/// Matching is case-insensitive and by substring, so "deploy" matches
/// "deployment". An empty query scores 0.
pub fn keyword_score(query: &str, text: &str) -> f64 {
    let query_words = tokenize(query);
    if query_words.is_empty() {
        return 0.0;
    }
    let text_words = tokenize(text);
    let matches = query_words
        .iter()
        .filter(|word| text_words.iter().any(|t| t.contains(word.as_str())))
        .count();
    matches as f64 / query_words.len() as f64
}

/// Normalized rank score of position `i` in a ranking of length `n`.
fn rank_score(i: usize, n: usize) -> f64 {
    (n - i) as f64 / n as f64
}

/// Merge two rankings by text identity.
///
/// A text present in both rankings yields one hit whose score is the sum of
/// its weighted rank scores. Output is sorted by score descending; ties keep
/// first-seen order, semantic ranking first. Within one ranking only the
/// first occurrence of a text counts.
pub fn merge_rankings(
    semantic: Vec<MemoryEntry>,
    keyword: Vec<MemoryEntry>,
    weights: HybridWeights,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut by_text: HashMap<String, usize> = HashMap::new();

    let n = semantic.len();
    for (i, entry) in semantic.into_iter().enumerate() {
        if by_text.contains_key(&entry.text) {
            continue;
        }
        by_text.insert(entry.text.clone(), hits.len());
        let mut hit = SearchHit::unscored(entry);
        hit.semantic_score = rank_score(i, n) * weights.semantic;
        hits.push(hit);
    }

    let n = keyword.len();
    let mut keyword_seen: HashSet<String> = HashSet::new();
    for (i, entry) in keyword.into_iter().enumerate() {
        if !keyword_seen.insert(entry.text.clone()) {
            continue;
        }
        let weighted = rank_score(i, n) * weights.keyword;
        match by_text.get(&entry.text) {
            Some(&idx) => hits[idx].keyword_score = weighted,
            None => {
                by_text.insert(entry.text.clone(), hits.len());
                let mut hit = SearchHit::unscored(entry);
                hit.keyword_score = weighted;
                hits.push(hit);
            }
        }
    }

    for hit in hits.iter_mut() {
        hit.score = hit.semantic_score + hit.keyword_score;
    }
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

/// Search engine over a short-term store and long-term memory.
#[derive(Clone)]
pub struct HybridSearch {
    ltm: LongTermMemory,
    stm: Arc<dyn ShortTermStore>,
    weights: HybridWeights,
    min_score: f32,
}

impl HybridSearch {
    pub fn new(ltm: LongTermMemory, stm: Arc<dyn ShortTermStore>, weights: HybridWeights, min_score: f32) -> Self {
        Self {
            ltm,
            stm,
            weights,
            min_score,
        }
    }

    pub fn weights(&self) -> HybridWeights {
        self.weights
    }

    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = match mode {
            SearchMode::Semantic => self.semantic(query, filter, top_k).await?,
            SearchMode::Keyword => self.keyword(query, filter, top_k).await?,
            SearchMode::Hybrid => {
                let limit = top_k * OVERFETCH_FACTOR;
                let semantic = self.semantic(query, filter, limit).await?;
                let keyword = self.keyword(query, filter, limit).await?;
                let mut merged = merge_rankings(
                    semantic.into_iter().map(|h| h.entry).collect(),
                    keyword.into_iter().map(|h| h.entry).collect(),
                    self.weights,
                );
                merged.truncate(top_k);
                merged
            }
            SearchMode::Metadata => {
                let mut candidates = self.candidates(filter).await?;
                candidates.truncate(top_k);
                candidates.into_iter().map(SearchHit::unscored).collect()
            }
        };

        debug!(mode = ?mode, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    async fn semantic(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        if !filter.allows(MemorySource::LongTerm) {
            return Ok(Vec::new());
        }

        let found = self
            .ltm
            .search(query, limit * OVERFETCH_FACTOR, &filter.store_filter(), self.min_score)
            .await?;

        Ok(found
            .into_iter()
            .filter_map(|entry| {
                let similarity = entry.score.unwrap_or(0.0) as f64;
                let entry = entry.into_memory_entry();
                filter.matches(&entry).then(|| SearchHit {
                    entry,
                    score: similarity,
                    semantic_score: similarity,
                    keyword_score: 0.0,
                })
            })
            .take(limit)
            .collect())
    }

    async fn keyword(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = self
            .candidates(filter)
            .await?
            .into_iter()
            .filter_map(|entry| {
                let overlap = keyword_score(query, &entry.text);
                (overlap > 0.0).then(|| SearchHit {
                    entry,
                    score: overlap,
                    semantic_score: 0.0,
                    keyword_score: overlap,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Every entry the filter allows, short-term first, oldest first.
    async fn candidates(&self, filter: &SearchFilter) -> Result<Vec<MemoryEntry>> {
        let mut candidates = Vec::new();

        if filter.allows(MemorySource::ShortTerm) {
            if let Some(ref session_id) = filter.session_id {
                let owner = filter.owner_id.as_deref().unwrap_or_default();
                let mut entries: Vec<_> = self.stm.get_all(session_id).await?.into_values().collect();
                entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));
                candidates.extend(entries.iter().map(|e| MemoryEntry::from_short_term(owner, e)));
            }
        }

        if filter.allows(MemorySource::LongTerm) {
            let store_filter = filter.store_filter();
            let mut entries: Vec<_> = self
                .ltm
                .export_all()
                .await?
                .into_iter()
                .filter(|e| store_filter.matches(e))
                .collect();
            entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            candidates.extend(entries.into_iter().map(|e| e.into_memory_entry()));
        }

        candidates.retain(|e| filter.matches(e));
        Ok(candidates)
    }
}
