//! SDK Configuration
//!
//! Defines configuration options for the Mnemos SDK. Configuration is read
//! from TOML; every table and field is optional and falls back to its
//! default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use mnemos_core::memory::{MAX_ARCHIVE_AFTER_DAYS, MAX_CLEANUP_INTERVAL_MINUTES, MAX_STM_TTL_MINUTES};
use mnemos_core::EngineConfig;

use crate::SDKResult;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "MNEMOS_CONFIG";

/// SDK configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SDKConfig {
    /// Owner on whose behalf the SDK's convenience methods act
    pub owner_id: String,

    /// SQLite file for long-term storage; in-memory when unset
    pub database_path: Option<PathBuf>,

    /// Memory configuration
    pub memory: MemoryConfig,

    /// Embedding configuration
    pub embedding: EmbeddingConfig,
}

impl Default for SDKConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            database_path: None,
            memory: MemoryConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Memory system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Similarity at which a new entry counts as a duplicate (default: 0.95)
    pub dedup_threshold: f64,

    /// Existing entries compared per candidate (default: 3)
    pub dedup_top_n: usize,

    /// Similarity at which entries are consolidated (default: 0.95)
    pub consolidation_threshold: f64,

    /// Age in days before entries are archived (default: 90)
    pub archive_after_days: i64,

    /// Archived entries below this importance are deleted (default: 0.3)
    pub archive_importance_threshold: f64,

    /// Delete originals once a summary or consolidation is stored (default: true)
    pub prune_after_summary: bool,

    /// Minimum similarity for semantic results (default: 0.3)
    pub min_search_score: f32,

    /// Hybrid search weight of the semantic ranking (default: 0.7)
    pub semantic_weight: f64,

    /// Hybrid search weight of the keyword ranking (default: 0.3)
    pub keyword_weight: f64,

    /// Short-term memory TTL in minutes (default: 30)
    pub stm_ttl_minutes: i64,

    /// Minutes between expiry sweeps (default: 5)
    pub cleanup_interval_minutes: u64,

    /// Run the background expiry sweeper (default: true)
    pub enable_cleanup: bool,

    /// Minimum score for promoting a session (default: 0.3)
    pub promotion_min_importance: f64,

    /// Conversation turns scoring above this reach long-term memory (default: 0.2)
    pub conversation_turn_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.95,
            dedup_top_n: 3,
            consolidation_threshold: 0.95,
            archive_after_days: 90,
            archive_importance_threshold: 0.3,
            prune_after_summary: true,
            min_search_score: 0.3,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            stm_ttl_minutes: 30,
            cleanup_interval_minutes: 5,
            enable_cleanup: true,
            promotion_min_importance: 0.3,
            conversation_turn_threshold: 0.2,
        }
    }
}

impl From<&MemoryConfig> for EngineConfig {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            dedup_threshold: config.dedup_threshold,
            dedup_top_n: config.dedup_top_n,
            consolidation_threshold: config.consolidation_threshold,
            archive_after_days: config.archive_after_days,
            archive_importance_threshold: config.archive_importance_threshold,
            prune_after_summary: config.prune_after_summary,
            min_search_score: config.min_search_score,
            semantic_weight: config.semantic_weight,
            keyword_weight: config.keyword_weight,
            stm_ttl_minutes: config.stm_ttl_minutes,
            cleanup_interval_minutes: config.cleanup_interval_minutes,
            promotion_min_importance: config.promotion_min_importance,
        }
    }
}

/// Which embedding provider backs long-term memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature hashing, no model download
    #[default]
    Hashing,
    /// all-MiniLM-L6-v2 via fastembed (feature `embeddings`)
    Fastembed,
}

/// Embedding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider (default: hashing)
    pub provider: EmbeddingProviderKind,

    /// Vector dimension (default: 384)
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            dimension: mnemos_core::memory::DEFAULT_DIMENSION,
        }
    }
}

impl SDKConfig {
    /// Create a new SDK config for the given owner
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
    }

    /// Persist long-term memory in a SQLite file
    pub fn with_database(mut self, database_path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(database_path.into());
        self
    }

    /// Set memory configuration
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Set embedding configuration
    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> SDKResult<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read a TOML config file
    pub fn load(path: impl AsRef<Path>) -> SDKResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Config file location: `$MNEMOS_CONFIG`, else `~/.mnemos/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".mnemos").join("config.toml")))
    }

    /// Load from the default location, or defaults if no file exists
    pub fn load_default() -> SDKResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Loading config");
                Self::load(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> SDKResult<String> {
        toml::to_string_pretty(self).map_err(|e| crate::SDKError::Other(e.into()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(ConfigValidationError::MissingOwnerId);
        }

        let m = &self.memory;
        let unit = [
            ("memory.dedup_threshold", m.dedup_threshold),
            ("memory.consolidation_threshold", m.consolidation_threshold),
            ("memory.archive_importance_threshold", m.archive_importance_threshold),
            ("memory.min_search_score", m.min_search_score as f64),
            ("memory.semantic_weight", m.semantic_weight),
            ("memory.keyword_weight", m.keyword_weight),
            ("memory.promotion_min_importance", m.promotion_min_importance),
            ("memory.conversation_turn_threshold", m.conversation_turn_threshold),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be between 0 and 1"));
            }
        }

        if m.semantic_weight == 0.0 && m.keyword_weight == 0.0 {
            return Err(invalid("memory.semantic_weight", "hybrid weights must not both be zero"));
        }
        if m.dedup_top_n == 0 {
            return Err(invalid("memory.dedup_top_n", "must be greater than 0"));
        }
        if !(0..=MAX_ARCHIVE_AFTER_DAYS).contains(&m.archive_after_days) {
            return Err(invalid(
                "memory.archive_after_days",
                &format!("must be between 0 and {}", MAX_ARCHIVE_AFTER_DAYS),
            ));
        }
        if !(1..=MAX_STM_TTL_MINUTES).contains(&m.stm_ttl_minutes) {
            return Err(invalid(
                "memory.stm_ttl_minutes",
                &format!("must be between 1 and {}", MAX_STM_TTL_MINUTES),
            ));
        }
        if !(1..=MAX_CLEANUP_INTERVAL_MINUTES).contains(&m.cleanup_interval_minutes) {
            return Err(invalid(
                "memory.cleanup_interval_minutes",
                &format!("must be between 1 and {}", MAX_CLEANUP_INTERVAL_MINUTES),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "must be greater than 0"));
        }
        if self.embedding.provider == EmbeddingProviderKind::Fastembed
            && self.embedding.dimension != mnemos_core::memory::DEFAULT_DIMENSION
        {
            return Err(invalid("embedding.dimension", "fastembed produces 384 dimensions"));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("owner_id is required")]
    MissingOwnerId,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_config() {
        let config = SDKConfig::default();
        assert_eq!(config.memory.dedup_threshold, 0.95);
        assert_eq!(config.memory.stm_ttl_minutes, 30);
        assert_eq!(config.memory.cleanup_interval_minutes, 5);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Hashing);
    }

    #[test]
    fn test_config_builder() {
        let config = SDKConfig::new("user-123").with_database("mnemos.db");

        assert_eq!(config.owner_id, "user-123");
        assert_eq!(config.database_path, Some(PathBuf::from("mnemos.db")));
    }

    #[test]
    fn test_config_validation() {
        let mut config = SDKConfig::default();
        assert_err!(config.validate()); // Missing owner_id

        config.owner_id = "user-123".into();
        assert_ok!(config.validate());

        config.memory.stm_ttl_minutes = 0;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.memory.semantic_weight = 0.0;
        config.memory.keyword_weight = 0.0;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.memory.dedup_threshold = 1.5;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.memory.archive_after_days = 1_000_000_000;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.memory.stm_ttl_minutes = i64::MAX;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.memory.cleanup_interval_minutes = u64::MAX;
        assert_err!(config.validate());

        let mut config = SDKConfig::new("u1");
        config.embedding = EmbeddingConfig {
            provider: EmbeddingProviderKind::Fastembed,
            dimension: 128,
        };
        assert_err!(config.validate());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SDKConfig::from_toml_str(
            r#"
            owner_id = "u1"

            [memory]
            dedup_threshold = 0.92
            enable_cleanup = false

            [embedding]
            dimension = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.owner_id, "u1");
        assert_eq!(config.memory.dedup_threshold, 0.92);
        assert!(!config.memory.enable_cleanup);
        assert_eq!(config.memory.archive_after_days, 90);
        assert_eq!(config.embedding.dimension, 128);
        assert_eq!(config.database_path, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "owner_id = \"from-file\"\n[embedding]\nprovider = \"fastembed\"").unwrap();

        let config = SDKConfig::load(file.path()).unwrap();
        assert_eq!(config.owner_id, "from-file");
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Fastembed);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            SDKConfig::from_toml_str("owner_id = ["),
            Err(crate::SDKError::Toml(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SDKConfig::new("u1").with_database("/tmp/mnemos.db");
        let text = config.to_toml_string().unwrap();
        assert_eq!(SDKConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_engine_config_conversion() {
        let memory = MemoryConfig {
            dedup_threshold: 0.9,
            ..Default::default()
        };
        let engine = EngineConfig::from(&memory);
        assert_eq!(engine.dedup_threshold, 0.9);
        assert_eq!(engine.semantic_weight, 0.7);
        assert_ok!(engine.validate());
    }
}
