//! mnemos-core - Memory consolidation and retrieval engine
//!
//! This crate decides what enters long-term storage and how memories are
//! recalled:
//!
//! - **memory**: deduplication, importance scoring, lifecycle, hybrid search,
//!   recall and promotion over pluggable stores
//! - **types**: entries and filters shared with adapters
//! - **error**: the engine's error type
//!
//! Enable the `db` feature for the SQLite-backed long-term store.

pub mod error;
pub mod memory;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use memory::{EngineConfig, LongTermMemory, MemoryEngine, RecallRequest};
pub use types::{LongTermEntry, MemoryEntry, MemorySource, Metadata, ShortTermEntry};
