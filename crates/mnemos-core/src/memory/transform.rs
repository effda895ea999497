//! Text transforms run around storage and retrieval.
//!
//! Storage transforms see a candidate before deduplication and scoring and
//! may rewrite its text or annotate its metadata. Retrieval transforms see
//! recall output and may reorder, annotate or drop entries.

use std::sync::Arc;

use crate::types::{MemoryEntry, Metadata};

pub trait MemoryTransform: Send + Sync {
    fn name(&self) -> &str;

    fn before_storage(&self, text: String, _metadata: &mut Metadata) -> String {
        text
    }

    fn before_retrieval(&self, _query: &str, results: Vec<MemoryEntry>) -> Vec<MemoryEntry> {
        results
    }
}

/// Ordered list of transforms.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn MemoryTransform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transform: Arc<dyn MemoryTransform>) -> Self {
        self.push(transform);
        self
    }

    pub fn push(&mut self, transform: Arc<dyn MemoryTransform>) {
        self.transforms.push(transform);
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn apply_storage(&self, text: String, metadata: &mut Metadata) -> String {
        self.transforms
            .iter()
            .fold(text, |text, t| t.before_storage(text, metadata))
    }

    pub fn apply_retrieval(&self, query: &str, results: Vec<MemoryEntry>) -> Vec<MemoryEntry> {
        self.transforms
            .iter()
            .fold(results, |results, t| t.before_retrieval(query, results))
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("transforms", &self.names())
            .finish()
    }
}
