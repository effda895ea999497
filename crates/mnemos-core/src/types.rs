//! Shared types for mnemos-core.
//!
//! These types cross the boundary between the engine and its adapters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Open key/value metadata attached to memory entries.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata keys the engine reads and writes.
pub mod keys {
    pub const CONVERSATION_ID: &str = "conversation_id";
    pub const IMPORTANCE: &str = "importance";
    pub const TYPE: &str = "type";
    pub const IS_SUMMARY: &str = "is_summary";
    pub const ORIGINAL_ID: &str = "original_id";
    pub const ORIGINAL_TIMESTAMP: &str = "original_timestamp";
    pub const SUMMARIZED_AT: &str = "summarized_at";
    pub const CONSOLIDATED_FROM: &str = "consolidated_from";
    pub const CONSOLIDATED_AT: &str = "consolidated_at";
    pub const SOURCE: &str = "source";
    pub const SESSION_ID: &str = "session_id";
    pub const KEY: &str = "key";
}

/// Importance assumed for entries stored without one.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

// ─────────────────────────────────────────────────────────────────────────────
// Memory Entries
// ─────────────────────────────────────────────────────────────────────────────

/// Which tier a recalled entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    ShortTerm,
    LongTerm,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemorySource::ShortTerm => write!(f, "short_term"),
            MemorySource::LongTerm => write!(f, "long_term"),
        }
    }
}

impl std::str::FromStr for MemorySource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_term" => Ok(MemorySource::ShortTerm),
            "long_term" => Ok(MemorySource::LongTerm),
            _ => Err(format!("Invalid memory source: {}", s)),
        }
    }
}

/// A recalled memory, independent of the tier it lives in.
///
/// Short-term entries have no id; long-term entries always do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: Option<String>,
    pub owner_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub source: MemorySource,
}

impl MemoryEntry {
    /// Build a recall entry from a live short-term entry.
    pub fn from_short_term(owner_id: &str, entry: &ShortTermEntry) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(keys::KEY.into(), entry.key.clone().into());
        metadata.insert(keys::SESSION_ID.into(), entry.session_id.clone().into());

        Self {
            id: None,
            owner_id: owner_id.to_string(),
            text: entry.value.clone(),
            metadata,
            importance: DEFAULT_IMPORTANCE,
            created_at: entry.timestamp,
            source: MemorySource::ShortTerm,
        }
    }
}

/// Session-scoped ephemeral value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermEntry {
    pub session_id: String,
    pub key: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

impl ShortTermEntry {
    pub fn new(session_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            key: key.into(),
            value: value.into(),
            timestamp: Utc::now(),
        }
    }

    /// An entry is expired once its age exceeds the TTL.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.timestamp > ttl
    }
}

/// Durable entry held by the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermEntry {
    pub id: String,
    pub owner_id: String,
    pub text: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    /// Similarity to the query when returned from a search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl LongTermEntry {
    /// Stored importance, clamped to [0, 1].
    pub fn importance(&self) -> f64 {
        self.metadata
            .get(keys::IMPORTANCE)
            .and_then(|v| v.as_f64())
            .unwrap_or(DEFAULT_IMPORTANCE)
            .clamp(0.0, 1.0)
    }

    pub fn is_summary(&self) -> bool {
        self.metadata
            .get(keys::IS_SUMMARY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Ids this entry was consolidated from, empty for ordinary entries.
    pub fn consolidated_from(&self) -> Vec<String> {
        self.metadata
            .get(keys::CONSOLIDATED_FROM)
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.metadata.get(keys::CONVERSATION_ID).and_then(|v| v.as_str())
    }

    /// Convert into the tier-independent recall shape.
    pub fn into_memory_entry(self) -> MemoryEntry {
        let importance = self.importance();
        MemoryEntry {
            id: Some(self.id),
            owner_id: self.owner_id,
            text: self.text,
            metadata: self.metadata,
            importance,
            created_at: self.created_at,
            source: MemorySource::LongTerm,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Filters
// ─────────────────────────────────────────────────────────────────────────────

/// Filter pushed down to the vector store: owner plus metadata equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreFilter {
    pub owner_id: Option<String>,
    pub metadata: Metadata,
}

impl StoreFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// All conditions are ANDed.
    pub fn matches(&self, entry: &LongTermEntry) -> bool {
        if let Some(ref owner) = self.owner_id {
            if &entry.owner_id != owner {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(key, value)| entry.metadata.get(key) == Some(value))
    }
}
