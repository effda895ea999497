//! Mnemos SDK - configuration and wiring for the dual-tier memory engine
//!
//! The engine itself lives in `mnemos-core`; this crate adds:
//!
//! - **config** - TOML configuration with validation
//! - **embeddings** - Embedding provider selection (hashing, fastembed)
//! - **conversation** - Turn-by-turn conversation memory
//! - **transforms** - Built-in text transforms
//! - **telemetry** - Tracing subscriber setup
//!
//! # Example
//!
//! ```rust,no_run
//! use mnemos_sdk::{RecallRequest, SDK, SDKConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let mut sdk = SDK::new(SDKConfig::load_default()?)?;
//!     sdk.initialize().await?;
//!
//!     sdk.memory().set_short_term("session-1", "topic", "release planning").await?;
//!     let memories = sdk
//!         .memory()
//!         .recall(&RecallRequest::new("user-123", "release").session("session-1"))
//!         .await?;
//!
//!     sdk.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversation;
pub mod embeddings;
pub mod telemetry;
pub mod transforms;

mod error;
mod sdk;

// Re-export main SDK types
pub use config::{EmbeddingConfig, EmbeddingProviderKind, MemoryConfig, SDKConfig};
pub use conversation::{ConversationMemory, ConversationTurn};
pub use error::{SDKError, SDKResult};
pub use sdk::SDK;

// Re-export the engine surface
pub use mnemos_core::memory::{
    EngineConfig, LifecycleReport, MemoryEngine, MemoryStats, RecallRequest, SearchFilter, SearchHit, SearchMode,
};
pub use mnemos_core::{LongTermEntry, MemoryEntry, MemorySource, Metadata, ShortTermEntry};
