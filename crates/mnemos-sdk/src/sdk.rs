//! Main SDK Entry Point
//!
//! Wires configuration, embeddings, stores and the engine together.

use std::sync::Arc;

#[cfg(feature = "db")]
use tracing::info;

use mnemos_core::memory::{
    EngineConfig, ExpirySweeper, InMemoryShortTermStore, InMemoryVectorStore, LifecycleReport, MemoryEngine,
    MemoryStats, RecallRequest, TransformPipeline, VectorStore,
};
use mnemos_core::{LongTermMemory, MemoryEntry, Metadata};

use crate::conversation::ConversationMemory;
use crate::embeddings::build_embedder;
use crate::transforms::NormalizeWhitespace;
use crate::{SDKConfig, SDKResult};

/// Mnemos SDK - Main entry point
///
/// Convenience methods act on behalf of the configured `owner_id`; the
/// engine returned by [`SDK::memory`] takes the owner per call.
///
/// # Example
///
/// ```rust,no_run
/// use mnemos_sdk::{SDK, SDKConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let mut sdk = SDK::new(SDKConfig::new("user-123").with_database("memory.db"))?;
///     sdk.initialize().await?;
///
///     sdk.remember("Deadline for the report is Friday", Default::default()).await?;
///     let memories = sdk.recall("report deadline", None, 5).await?;
///     println!("recalled {} memories", memories.len());
///
///     sdk.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct SDK {
    config: SDKConfig,

    engine: Arc<MemoryEngine>,

    conversation: ConversationMemory,

    /// Background expiry sweep, present while initialized
    sweeper: Option<ExpirySweeper>,

    initialized: bool,
}

impl SDK {
    /// Create a new SDK instance
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The embedding provider cannot be built
    /// - The database cannot be opened
    pub fn new(config: SDKConfig) -> SDKResult<Self> {
        config.validate()?;

        let embedder = build_embedder(&config.embedding)?;
        let store = open_vector_store(&config, embedder.dimension())?;
        let ltm = LongTermMemory::new(store, embedder)?;
        let engine_config = EngineConfig::from(&config.memory);
        let stm = Arc::new(InMemoryShortTermStore::new(engine_config.stm_ttl()?));

        let engine = MemoryEngine::new(stm, ltm, engine_config)?
            .with_transforms(TransformPipeline::new().with(Arc::new(NormalizeWhitespace)));
        let engine = Arc::new(engine);
        let conversation = ConversationMemory::new(engine.clone(), config.memory.conversation_turn_threshold);

        Ok(Self {
            config,
            engine,
            conversation,
            sweeper: None,
            initialized: false,
        })
    }

    /// Initialize the SDK
    ///
    /// Starts the short-term expiry sweep when cleanup is enabled. Must be
    /// called inside a Tokio runtime.
    pub async fn initialize(&mut self) -> SDKResult<()> {
        if self.initialized {
            return Ok(());
        }

        if self.config.memory.enable_cleanup {
            let every = self.engine.config().cleanup_interval()?;
            self.sweeper = Some(ExpirySweeper::start(self.engine.short_term(), every));
        }

        self.initialized = true;
        Ok(())
    }

    /// Shutdown the SDK
    ///
    /// Stops background tasks. Safe to call more than once.
    pub async fn shutdown(&mut self) -> SDKResult<()> {
        if let Some(mut sweeper) = self.sweeper.take() {
            sweeper.stop().await;
        }

        self.initialized = false;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the expiry sweep is running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(ExpirySweeper::is_running)
    }

    pub fn config(&self) -> &SDKConfig {
        &self.config
    }

    /// Get the memory engine
    pub fn memory(&self) -> &MemoryEngine {
        &self.engine
    }

    /// Shared handle to the memory engine
    pub fn engine(&self) -> Arc<MemoryEngine> {
        self.engine.clone()
    }

    pub fn conversation(&self) -> &ConversationMemory {
        &self.conversation
    }

    /// Owner used by the convenience methods
    pub fn owner_id(&self) -> &str {
        &self.config.owner_id
    }

    /// Store `text` in long-term memory, scored and deduplicated.
    pub async fn remember(&self, text: &str, metadata: Metadata) -> SDKResult<Option<String>> {
        Ok(self.engine.add_entry(self.owner_id(), text, metadata, None).await?)
    }

    /// Recall across both tiers, short-term matches from `session_id` first.
    pub async fn recall(&self, query: &str, session_id: Option<&str>, top_k: usize) -> SDKResult<Vec<MemoryEntry>> {
        let mut request = RecallRequest::new(self.owner_id(), query).top_k(top_k);
        if let Some(session_id) = session_id {
            request = request.session(session_id);
        }
        Ok(self.engine.recall(&request).await?)
    }

    /// Record a conversation turn for the owner.
    pub async fn add_turn(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
        context: Metadata,
    ) -> SDKResult<Option<String>> {
        self.conversation
            .add_turn(self.owner_id(), session_id, user_message, assistant_message, context)
            .await
    }

    /// Promote a session with the configured minimum importance.
    pub async fn promote(&self, session_id: &str) -> SDKResult<Option<String>> {
        Ok(self.engine.promote_default(session_id, self.owner_id(), None).await?)
    }

    /// Archive and consolidate the owner's long-term entries.
    pub async fn run_lifecycle(&self) -> SDKResult<LifecycleReport> {
        Ok(self.engine.run_lifecycle(self.owner_id()).await?)
    }

    pub async fn stats(&self, session_id: Option<&str>) -> SDKResult<MemoryStats> {
        Ok(self.engine.stats(self.owner_id(), session_id).await?)
    }
}

#[cfg(feature = "db")]
fn open_vector_store(config: &SDKConfig, dimension: usize) -> SDKResult<Arc<dyn VectorStore>> {
    match &config.database_path {
        Some(path) => {
            info!(path = %path.display(), "Opening long-term store");
            Ok(Arc::new(mnemos_core::memory::SqliteVectorStore::open(path, dimension)?))
        }
        None => Ok(Arc::new(InMemoryVectorStore::new(dimension))),
    }
}

#[cfg(not(feature = "db"))]
fn open_vector_store(config: &SDKConfig, dimension: usize) -> SDKResult<Arc<dyn VectorStore>> {
    if config.database_path.is_some() {
        return Err(crate::config::ConfigValidationError::InvalidValue {
            field: "database_path".into(),
            message: "a database requires the `db` feature".into(),
        }
        .into());
    }
    Ok(Arc::new(InMemoryVectorStore::new(dimension)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use mnemos_core::MemorySource;

    #[tokio::test]
    async fn test_sdk_creation() {
        let sdk = SDK::new(SDKConfig::new("test-user")).unwrap();
        assert!(!sdk.is_initialized());
        assert_eq!(sdk.config().owner_id, "test-user");
    }

    #[tokio::test]
    async fn test_sdk_validation() {
        let config = SDKConfig::default(); // Missing owner_id
        let err = SDK::new(config).err().unwrap();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_initialize_and_shutdown() {
        let mut sdk = SDK::new(SDKConfig::new("test-user")).unwrap();

        sdk.initialize().await.unwrap();
        assert!(sdk.is_initialized());
        assert!(sdk.is_sweeping());

        sdk.shutdown().await.unwrap();
        assert!(!sdk.is_initialized());
        assert!(!sdk.is_sweeping());
        sdk.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_disabled() {
        let config = SDKConfig::new("test-user").with_memory(MemoryConfig {
            enable_cleanup: false,
            ..Default::default()
        });
        let mut sdk = SDK::new(config).unwrap();

        sdk.initialize().await.unwrap();
        assert!(!sdk.is_sweeping());
    }

    #[tokio::test]
    async fn test_whitespace_is_normalized_on_store() {
        let sdk = SDK::new(SDKConfig::new("test-user")).unwrap();

        sdk.memory()
            .add_entry("test-user", "  urgent:   ship   the release ", Metadata::new(), None)
            .await
            .unwrap();

        let entries = sdk.memory().long_term().export_owner("test-user").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "urgent: ship the release");
    }

    #[tokio::test]
    async fn test_promotion_keeps_line_breaks() {
        let sdk = SDK::new(SDKConfig::new("u1")).unwrap();
        sdk.memory().set_short_term("s1", "a", "urgent:  call client").await.unwrap();
        sdk.memory().set_short_term("s1", "b", "deadline friday").await.unwrap();

        let id = sdk.promote("s1").await.unwrap();
        assert!(id.is_some());

        let entries = sdk.memory().long_term().export_owner("u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "a: urgent: call client\nb: deadline friday");
        assert!(sdk.memory().get_all_short_term("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversation_turn_keeps_line_breaks() {
        let sdk = SDK::new(SDKConfig::new("u1")).unwrap();

        let id = sdk
            .add_turn("s1", "Remind me about the deadline", "Noted,  the deadline is Friday", Metadata::new())
            .await
            .unwrap();
        assert!(id.is_some());

        let entries = sdk.memory().long_term().export_owner("u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].text,
            "User: Remind me about the deadline\nAssistant: Noted, the deadline is Friday"
        );
        assert_eq!(sdk.conversation().recent_turns("s1", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_convenience_methods_use_configured_owner() {
        let sdk = SDK::new(SDKConfig::new("u1")).unwrap();
        assert_eq!(sdk.owner_id(), "u1");

        let id = sdk.remember("Quarterly report deadline is Friday", Metadata::new()).await.unwrap();
        assert!(id.is_some());
        sdk.memory().set_short_term("s1", "note", "report draft shared").await.unwrap();

        let stats = sdk.stats(Some("s1")).await.unwrap();
        assert_eq!(stats.long_term_entries, 1);
        assert_eq!(stats.short_term_entries, 1);
        assert_eq!(sdk.memory().stats("someone-else", None).await.unwrap().long_term_entries, 0);

        let recalled = sdk.recall("report", Some("s1"), 1).await.unwrap();
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].source, MemorySource::ShortTerm);
        assert_eq!(recalled[0].owner_id, "u1");

        let report = sdk.run_lifecycle().await.unwrap();
        assert!(!report.has_changes());
    }

    #[cfg(feature = "db")]
    #[tokio::test]
    async fn test_entries_persist_across_instances() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("memory.db");

        {
            let sdk = SDK::new(SDKConfig::new("test-user").with_database(&path)).unwrap();
            let id = sdk
                .memory()
                .add_entry("test-user", "Project deadline moved to March", Metadata::new(), None)
                .await
                .unwrap();
            assert!(id.is_some());
        }

        let sdk = SDK::new(SDKConfig::new("test-user").with_database(&path)).unwrap();
        let stats = sdk.memory().stats("test-user", None).await.unwrap();
        assert_eq!(stats.long_term_entries, 1);
    }
}
