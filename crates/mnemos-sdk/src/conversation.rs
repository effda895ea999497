//! Conversation-aware memory.
//!
//! Each turn is kept in short-term memory for immediate context, and turns
//! that score above a threshold are also written to long-term memory.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use mnemos_core::memory::{score_importance, MemoryEngine, ScoringContext};
use mnemos_core::types::keys;
use mnemos_core::Metadata;

use crate::SDKResult;

/// Short-term key prefix of stored turns
pub const TURN_KEY_PREFIX: &str = "conv_turn_";

/// `type` metadata value of turns in long-term memory
pub const CONVERSATION_TURN_TYPE: &str = "conversation_turn";

/// A stored user/assistant exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_message: String,
    pub assistant_message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub context: Metadata,
}

impl ConversationTurn {
    /// Text form used for scoring and long-term storage
    pub fn combined_text(&self) -> String {
        format!("User: {}\nAssistant: {}", self.user_message, self.assistant_message)
    }
}

pub struct ConversationMemory {
    engine: Arc<MemoryEngine>,
    turn_threshold: f64,
}

impl ConversationMemory {
    pub fn new(engine: Arc<MemoryEngine>, turn_threshold: f64) -> Self {
        Self {
            engine,
            turn_threshold,
        }
    }

    /// Record a turn.
    ///
    /// Returns the long-term id when the turn was important enough to keep
    /// and was not a duplicate.
    pub async fn add_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
        context: Metadata,
    ) -> SDKResult<Option<String>> {
        let turn = ConversationTurn {
            user_message: user_message.to_string(),
            assistant_message: assistant_message.to_string(),
            timestamp: Utc::now(),
            context,
        };

        let key = self.next_turn_key(session_id, turn.timestamp).await?;
        self.engine
            .set_short_term(session_id, &key, &serde_json::to_string(&turn)?)
            .await?;

        let text = turn.combined_text();
        let importance = score_importance(&text, &ScoringContext::default());
        if importance <= self.turn_threshold {
            debug!(session_id = %session_id, importance = importance, "Turn kept in short-term only");
            return Ok(None);
        }

        let mut metadata = Metadata::new();
        metadata.insert(keys::TYPE.into(), Value::from(CONVERSATION_TURN_TYPE));
        metadata.insert(keys::SESSION_ID.into(), Value::from(session_id));
        metadata.insert("context".into(), Value::Object(turn.context));

        Ok(self
            .engine
            .add_entry(owner_id, &text, metadata, Some(importance))
            .await?)
    }

    /// The last `last_n` turns of a session, oldest first.
    ///
    /// Entries that do not parse as turns are skipped.
    pub async fn recent_turns(&self, session_id: &str, last_n: usize) -> SDKResult<Vec<ConversationTurn>> {
        let mut turns: Vec<(String, ConversationTurn)> = self
            .engine
            .get_all_short_term(session_id)
            .await?
            .into_iter()
            .filter(|(key, _)| key.starts_with(TURN_KEY_PREFIX))
            .filter_map(|(key, entry)| {
                serde_json::from_str::<ConversationTurn>(&entry.value)
                    .ok()
                    .map(|turn| (key, turn))
            })
            .collect();

        turns.sort_by(|(ka, a), (kb, b)| a.timestamp.cmp(&b.timestamp).then_with(|| ka.cmp(kb)));
        let skip = turns.len().saturating_sub(last_n);
        Ok(turns.into_iter().skip(skip).map(|(_, turn)| turn).collect())
    }

    /// Long-term conversation turns relevant to `query`.
    pub async fn relevant_history(&self, owner_id: &str, query: &str, top_k: usize) -> SDKResult<Vec<String>> {
        let mut filter = Metadata::new();
        filter.insert(keys::TYPE.into(), Value::from(CONVERSATION_TURN_TYPE));

        let entries = self.engine.search_long_term(query, owner_id, top_k, filter).await?;
        Ok(entries.into_iter().map(|e| e.text).collect())
    }

    async fn next_turn_key(&self, session_id: &str, timestamp: DateTime<Utc>) -> SDKResult<String> {
        let base = format!("{}{}", TURN_KEY_PREFIX, timestamp.timestamp_millis());
        let mut key = base.clone();
        let mut suffix = 1;
        while self.engine.get_short_term(session_id, &key).await?.is_some() {
            key = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::memory::{EngineConfig, HashingEmbedder, InMemoryShortTermStore, InMemoryVectorStore};
    use mnemos_core::LongTermMemory;

    fn memory() -> ConversationMemory {
        let ltm = LongTermMemory::new(
            Arc::new(InMemoryVectorStore::new(384)),
            Arc::new(HashingEmbedder::new(384).unwrap()),
        )
        .unwrap();
        let engine = MemoryEngine::new(
            Arc::new(InMemoryShortTermStore::with_ttl_minutes(30)),
            ltm,
            EngineConfig::default(),
        )
        .unwrap();
        ConversationMemory::new(Arc::new(engine), 0.2)
    }

    #[tokio::test]
    async fn test_important_turn_reaches_long_term() {
        let memory = memory();
        let id = memory
            .add_turn("u1", "s1", "Remind me about the deadline", "Sure, I will remind you", Metadata::new())
            .await
            .unwrap();
        assert!(id.is_some());

        let history = memory.relevant_history("u1", "remind me about the deadline", 3).await.unwrap();
        assert_eq!(history, vec!["User: Remind me about the deadline\nAssistant: Sure, I will remind you"]);
    }

    #[tokio::test]
    async fn test_small_talk_stays_short_term() {
        let memory = memory();
        let id = memory.add_turn("u1", "s1", "hi", "hello", Metadata::new()).await.unwrap();
        assert!(id.is_none());

        let turns = memory.recent_turns("s1", 5).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_message, "hi");
        assert!(memory.relevant_history("u1", "hi", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_turns_returns_last_n_in_order() {
        let memory = memory();
        for i in 0..4 {
            memory
                .add_turn("u1", "s1", &format!("message {}", i), "ok", Metadata::new())
                .await
                .unwrap();
        }
        memory.engine.set_short_term("s1", "conv_turn_garbage", "not json").await.unwrap();
        memory.engine.set_short_term("s1", "other", "ignored").await.unwrap();

        let turns = memory.recent_turns("s1", 2).await.unwrap();
        let messages: Vec<&str> = turns.iter().map(|t| t.user_message.as_str()).collect();
        assert_eq!(messages, vec!["message 2", "message 3"]);
    }
}
