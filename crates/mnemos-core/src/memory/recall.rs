//! Memory engine: the entry point over both tiers.
//!
//! Write path: transforms, deduplication, scoring, then long-term insert.
//! Read path: short-term substring matches first, then hybrid search over
//! long-term storage when those are not enough.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::dedup::Deduplicator;
use super::lifecycle::{LifecycleManager, LifecycleReport};
use super::long_term::LongTermMemory;
use super::scoring::{score_importance, ScoringContext};
use super::search::{HybridSearch, SearchFilter, SearchHit, SearchMode};
use super::traits::ShortTermStore;
use super::transform::TransformPipeline;
use super::EngineConfig;
use crate::error::{Error, Result};
use crate::types::{keys, MemoryEntry, MemorySource, Metadata, ShortTermEntry, StoreFilter};

/// `source` metadata value of promoted session content.
pub const PROMOTION_SOURCE: &str = "stm_promotion";

/// Default number of recall results.
pub const DEFAULT_RECALL_TOP_K: usize = 5;

/// Parameters of a recall.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallRequest {
    pub owner_id: String,
    pub query: String,
    /// Session whose short-term entries are checked first.
    pub session_id: Option<String>,
    /// Restricts long-term results to one conversation.
    pub conversation_id: Option<String>,
    pub top_k: usize,
    pub mode: SearchMode,
}

impl RecallRequest {
    pub fn new(owner_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            query: query.into(),
            session_id: None,
            conversation_id: None,
            top_k: DEFAULT_RECALL_TOP_K,
            mode: SearchMode::Hybrid,
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Entry counts for an owner and, optionally, a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub long_term_entries: usize,
    pub summaries: usize,
    pub consolidated: usize,
    pub short_term_entries: usize,
}

pub struct MemoryEngine {
    stm: Arc<dyn ShortTermStore>,
    ltm: LongTermMemory,
    dedup: Deduplicator,
    search: HybridSearch,
    lifecycle: LifecycleManager,
    transforms: TransformPipeline,
    config: EngineConfig,
}

impl MemoryEngine {
    /// Build an engine over the given adapters.
    ///
    /// Fails with a validation error on an invalid configuration.
    pub fn new(stm: Arc<dyn ShortTermStore>, ltm: LongTermMemory, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            dedup: Deduplicator::new(config.dedup_threshold, config.dedup_top_n),
            search: HybridSearch::new(ltm.clone(), stm.clone(), config.hybrid_weights(), config.min_search_score),
            lifecycle: LifecycleManager::new(ltm.clone(), config.lifecycle_config()),
            transforms: TransformPipeline::default(),
            stm,
            ltm,
            config,
        })
    }

    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn short_term(&self) -> Arc<dyn ShortTermStore> {
        self.stm.clone()
    }

    pub fn long_term(&self) -> &LongTermMemory {
        &self.ltm
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Short-term
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn set_short_term(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.stm
            .set(session_id, key, ShortTermEntry::new(session_id, key, value))
            .await
    }

    pub async fn get_short_term(&self, session_id: &str, key: &str) -> Result<Option<ShortTermEntry>> {
        self.stm.get(session_id, key).await
    }

    pub async fn get_all_short_term(&self, session_id: &str) -> Result<HashMap<String, ShortTermEntry>> {
        self.stm.get_all(session_id).await
    }

    pub async fn clear_short_term(&self, session_id: &str) -> Result<()> {
        self.stm.clear(session_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Long-term
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `text` for `owner_id` unless it duplicates an existing entry.
    ///
    /// Returns the new id, or `None` when deduplication rejected the text.
    /// Without an explicit importance the text is scored.
    pub async fn add_entry(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Metadata,
        importance: Option<f64>,
    ) -> Result<Option<String>> {
        self.add_entry_with_context(owner_id, text, metadata, importance, &ScoringContext::default())
            .await
    }

    pub async fn add_entry_with_context(
        &self,
        owner_id: &str,
        text: &str,
        mut metadata: Metadata,
        importance: Option<f64>,
        context: &ScoringContext,
    ) -> Result<Option<String>> {
        if owner_id.is_empty() {
            return Err(Error::validation("owner id must not be empty"));
        }
        if importance.is_some_and(|i| !i.is_finite()) {
            return Err(Error::validation("importance must be a finite number"));
        }

        let text = self.transforms.apply_storage(text.to_string(), &mut metadata);
        if text.trim().is_empty() {
            return Err(Error::validation("memory text must not be empty"));
        }

        let vector = self.ltm.encode(&text).await?;
        let conversation_id = metadata
            .get(keys::CONVERSATION_ID)
            .and_then(Value::as_str)
            .map(str::to_string);

        if self
            .dedup
            .find_duplicate(&self.ltm, owner_id, conversation_id.as_deref(), &text, &vector)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let importance = importance
            .map(|i| i.clamp(0.0, 1.0))
            .unwrap_or_else(|| score_importance(&text, context));
        metadata.insert(keys::IMPORTANCE.into(), Value::from(importance));

        let id = self.ltm.add_with_vector(owner_id, &text, metadata, vector).await?;
        info!(owner_id = %owner_id, id = %id, importance = importance, "Added long-term entry");
        Ok(Some(id))
    }

    /// Semantic search over an owner's long-term entries.
    pub async fn search_long_term(
        &self,
        query: &str,
        owner_id: &str,
        top_k: usize,
        metadata: Metadata,
    ) -> Result<Vec<MemoryEntry>> {
        let filter = StoreFilter {
            owner_id: Some(owner_id.to_string()),
            metadata,
        };
        let entries = self
            .ltm
            .search(query, top_k, &filter, self.config.min_search_score)
            .await?
            .into_iter()
            .map(|e| e.into_memory_entry())
            .collect();
        Ok(self.transforms.apply_retrieval(query, entries))
    }

    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.search.search(query, mode, filter, top_k).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recall and promotion
    // ─────────────────────────────────────────────────────────────────────────

    /// Recall memories for a query across both tiers.
    ///
    /// Short-term entries of the session whose value contains the query
    /// (case-insensitive) come first, newest first. When they already fill
    /// `top_k`, long-term storage is not queried. Otherwise long-term hits
    /// follow, skipping texts already present.
    pub async fn recall(&self, request: &RecallRequest) -> Result<Vec<MemoryEntry>> {
        if request.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut results = match request.session_id {
            Some(ref session_id) => self.short_term_matches(&request.owner_id, session_id, &request.query).await?,
            None => Vec::new(),
        };

        if results.len() >= request.top_k {
            results.truncate(request.top_k);
            debug!(owner_id = %request.owner_id, count = results.len(), "Recall served from short-term");
            return Ok(self.transforms.apply_retrieval(&request.query, results));
        }

        let mut filter = SearchFilter::owner(&request.owner_id).with_source(MemorySource::LongTerm);
        if let Some(ref conversation_id) = request.conversation_id {
            filter = filter.with_metadata(keys::CONVERSATION_ID, conversation_id.as_str());
        }
        let hits = self
            .search
            .search(&request.query, request.mode, &filter, request.top_k)
            .await?;

        let mut seen: HashSet<String> = results.iter().map(|e| e.text.clone()).collect();
        for hit in hits {
            if seen.insert(hit.entry.text.clone()) {
                results.push(hit.entry);
            }
        }
        results.truncate(request.top_k);

        debug!(owner_id = %request.owner_id, count = results.len(), "Recall complete");
        Ok(self.transforms.apply_retrieval(&request.query, results))
    }

    async fn short_term_matches(&self, owner_id: &str, session_id: &str, query: &str) -> Result<Vec<MemoryEntry>> {
        let needle = query.to_lowercase();
        let mut matches: Vec<ShortTermEntry> = self
            .stm
            .get_all(session_id)
            .await?
            .into_values()
            .filter(|e| e.value.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.key.cmp(&b.key)));

        Ok(matches
            .iter()
            .map(|e| MemoryEntry::from_short_term(owner_id, e))
            .collect())
    }

    /// Collapse a session into one long-term entry.
    ///
    /// The session's entries become `key: value` lines, scored with the
    /// entry count as conversation length. Below `min_importance` nothing
    /// changes. Otherwise the text is stored with `source=stm_promotion` and
    /// the session is cleared; the id is `None` if the text duplicated an
    /// existing entry.
    pub async fn promote(
        &self,
        session_id: &str,
        owner_id: &str,
        conversation_id: Option<&str>,
        min_importance: f64,
    ) -> Result<Option<String>> {
        let mut entries: Vec<ShortTermEntry> = self.stm.get_all(session_id).await?.into_values().collect();
        if entries.is_empty() {
            return Ok(None);
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key)));

        let text = entries
            .iter()
            .map(|e| format!("{}: {}", e.key, e.value))
            .collect::<Vec<_>>()
            .join("\n");
        let context = ScoringContext::with_conversation_length(entries.len());
        let score = score_importance(&text, &context);

        if score < min_importance {
            debug!(session_id = %session_id, score = score, min_importance = min_importance, "Session below promotion threshold");
            return Ok(None);
        }

        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE.into(), Value::from(PROMOTION_SOURCE));
        metadata.insert(keys::SESSION_ID.into(), Value::from(session_id));
        if let Some(conversation_id) = conversation_id {
            metadata.insert(keys::CONVERSATION_ID.into(), Value::from(conversation_id));
        }

        let id = self
            .add_entry_with_context(owner_id, &text, metadata, Some(score), &context)
            .await?;
        self.stm.clear(session_id).await?;

        info!(session_id = %session_id, owner_id = %owner_id, promoted = id.is_some(), "Promoted session");
        Ok(id)
    }

    /// Promote with the configured minimum importance.
    pub async fn promote_default(
        &self,
        session_id: &str,
        owner_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<Option<String>> {
        self.promote(session_id, owner_id, conversation_id, self.config.promotion_min_importance)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn run_lifecycle(&self, owner_id: &str) -> Result<LifecycleReport> {
        self.lifecycle.run_cycle(owner_id).await
    }

    pub async fn stats(&self, owner_id: &str, session_id: Option<&str>) -> Result<MemoryStats> {
        let entries = self.ltm.export_owner(owner_id).await?;
        let short_term_entries = match session_id {
            Some(session_id) => self.stm.get_all(session_id).await?.len(),
            None => 0,
        };

        Ok(MemoryStats {
            long_term_entries: entries.len(),
            summaries: entries.iter().filter(|e| e.is_summary()).count(),
            consolidated: entries.iter().filter(|e| !e.consolidated_from().is_empty()).count(),
            short_term_entries,
        })
    }
}
