//! Dual-tier memory engine for conversational agents.
//!
//! - **Short-term memory**: session-scoped key/value context with a TTL
//! - **Long-term memory**: durable, semantically searchable text entries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        MemoryEngine                             │
//! │  write: transforms ─▶ Deduplicator ─▶ score_importance ─▶ add  │
//! │  read:  short-term matches ─▶ HybridSearch ─▶ merge / cap      │
//! │                                                                 │
//! │  ┌──────────────────┐                 ┌──────────────────────┐ │
//! │  │  ShortTermStore  │                 │    LongTermMemory    │ │
//! │  │  (TTL, session)  │                 │ VectorStore+Embedder │ │
//! │  └──────────────────┘                 └──────────────────────┘ │
//! │          ▲                                       ▲             │
//! │    ExpirySweeper                         LifecycleManager      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use mnemos_core::memory::*;
//!
//! let ltm = LongTermMemory::new(
//!     Arc::new(InMemoryVectorStore::new(384)),
//!     Arc::new(HashingEmbedder::default()),
//! )?;
//! let stm = Arc::new(InMemoryShortTermStore::with_ttl_minutes(30));
//! let engine = MemoryEngine::new(stm, ltm, EngineConfig::default())?;
//!
//! engine.add_entry("u1", "User prefers dark mode", Metadata::new(), None).await?;
//! let memories = engine.recall(&RecallRequest::new("u1", "dark mode")).await?;
//! ```

mod dedup;
mod embedding;
mod lifecycle;
mod long_term;
mod recall;
mod scoring;
mod search;
mod similarity;
#[cfg(feature = "db")]
mod sqlite;
mod store;
mod sweeper;
mod traits;
mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use dedup::*;
pub use embedding::*;
pub use lifecycle::*;
pub use long_term::*;
pub use recall::*;
pub use scoring::*;
pub use search::*;
pub use similarity::*;
#[cfg(feature = "db")]
pub use sqlite::*;
pub use store::*;
pub use sweeper::*;
pub use traits::*;
pub use transform::*;

use crate::error::{Error, Result};
pub use crate::types::Metadata;

/// Upper bound on `archive_after_days` (a century).
pub const MAX_ARCHIVE_AFTER_DAYS: i64 = 36_500;

/// Upper bound on `stm_ttl_minutes` (a year).
pub const MAX_STM_TTL_MINUTES: i64 = 525_600;

/// Upper bound on `cleanup_interval_minutes` (a day).
pub const MAX_CLEANUP_INTERVAL_MINUTES: u64 = 1_440;

/// Runtime configuration consumed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Similarity at or above which a candidate is a duplicate.
    pub dedup_threshold: f64,
    /// Existing entries compared per candidate.
    pub dedup_top_n: usize,
    /// Similarity at or above which entries are consolidated.
    pub consolidation_threshold: f64,
    /// Age in days after which entries are archived.
    pub archive_after_days: i64,
    /// Archived entries below this importance are deleted.
    pub archive_importance_threshold: f64,
    /// Delete sources after a summary or consolidation is stored.
    pub prune_after_summary: bool,
    /// Minimum similarity for semantic results.
    pub min_search_score: f32,
    pub semantic_weight: f64,
    pub keyword_weight: f64,
    /// Short-term time-to-live in minutes.
    pub stm_ttl_minutes: i64,
    /// Minutes between expiry sweeps.
    pub cleanup_interval_minutes: u64,
    /// Minimum score for promoting a session.
    pub promotion_min_importance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            dedup_top_n: DEFAULT_DEDUP_TOP_N,
            consolidation_threshold: 0.95,
            archive_after_days: 90,
            archive_importance_threshold: 0.3,
            prune_after_summary: true,
            min_search_score: 0.3,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            stm_ttl_minutes: 30,
            cleanup_interval_minutes: 5,
            promotion_min_importance: 0.3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("dedup_threshold", self.dedup_threshold),
            ("consolidation_threshold", self.consolidation_threshold),
            ("archive_importance_threshold", self.archive_importance_threshold),
            ("min_search_score", self.min_search_score as f64),
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("promotion_min_importance", self.promotion_min_importance),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::validation(format!("{} must be between 0 and 1, got {}", name, value)));
            }
        }
        if self.semantic_weight + self.keyword_weight == 0.0 {
            return Err(Error::validation("hybrid weights must not both be zero"));
        }
        if self.dedup_top_n == 0 {
            return Err(Error::validation("dedup_top_n must be greater than 0"));
        }
        if !(0..=MAX_ARCHIVE_AFTER_DAYS).contains(&self.archive_after_days) {
            return Err(Error::validation(format!(
                "archive_after_days must be between 0 and {}",
                MAX_ARCHIVE_AFTER_DAYS
            )));
        }
        if !(1..=MAX_STM_TTL_MINUTES).contains(&self.stm_ttl_minutes) {
            return Err(Error::validation(format!(
                "stm_ttl_minutes must be between 1 and {}",
                MAX_STM_TTL_MINUTES
            )));
        }
        if !(1..=MAX_CLEANUP_INTERVAL_MINUTES).contains(&self.cleanup_interval_minutes) {
            return Err(Error::validation(format!(
                "cleanup_interval_minutes must be between 1 and {}",
                MAX_CLEANUP_INTERVAL_MINUTES
            )));
        }
        Ok(())
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            archive_after_days: self.archive_after_days,
            archive_importance_threshold: self.archive_importance_threshold,
            consolidation_threshold: self.consolidation_threshold,
            prune_sources: self.prune_after_summary,
        }
    }

    pub fn hybrid_weights(&self) -> HybridWeights {
        HybridWeights {
            semantic: self.semantic_weight,
            keyword: self.keyword_weight,
        }
    }

    pub fn stm_ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.stm_ttl_minutes)
            .ok_or_else(|| Error::validation(format!("stm_ttl_minutes out of range: {}", self.stm_ttl_minutes)))
    }

    pub fn cleanup_interval(&self) -> Result<std::time::Duration> {
        self.cleanup_interval_minutes
            .checked_mul(60)
            .map(std::time::Duration::from_secs)
            .ok_or_else(|| {
                Error::validation(format!(
                    "cleanup_interval_minutes out of range: {}",
                    self.cleanup_interval_minutes
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hybrid_weights(), HybridWeights::default());
        assert_eq!(config.cleanup_interval().unwrap(), std::time::Duration::from_secs(300));
        assert_eq!(config.stm_ttl().unwrap(), chrono::Duration::minutes(30));
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            EngineConfig {
                dedup_threshold: 1.2,
                ..Default::default()
            },
            EngineConfig {
                semantic_weight: 0.0,
                keyword_weight: 0.0,
                ..Default::default()
            },
            EngineConfig {
                stm_ttl_minutes: 0,
                ..Default::default()
            },
            EngineConfig {
                cleanup_interval_minutes: 0,
                ..Default::default()
            },
            EngineConfig {
                archive_after_days: 1_000_000_000,
                ..Default::default()
            },
            EngineConfig {
                stm_ttl_minutes: i64::MAX,
                ..Default::default()
            },
            EngineConfig {
                cleanup_interval_minutes: u64::MAX,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_out_of_range_durations_are_errors() {
        let config = EngineConfig {
            stm_ttl_minutes: i64::MAX,
            cleanup_interval_minutes: u64::MAX,
            ..Default::default()
        };
        assert!(config.stm_ttl().unwrap_err().is_validation());
        assert!(config.cleanup_interval().unwrap_err().is_validation());
    }
}
