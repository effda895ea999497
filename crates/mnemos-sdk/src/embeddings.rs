//! Embedding providers for long-term memory.
//!
//! - **hashing**: deterministic feature hashing from mnemos-core, no model
//! - **fastembed**: local all-MiniLM-L6-v2 inference (feature `embeddings`),
//!   loaded lazily on first use
//!
//! # Usage
//!
//! ```ignore
//! use mnemos_sdk::embeddings::build_embedder;
//!
//! let embedder = build_embedder(&config.embedding)?;
//! let vector = embedder.encode("hello world").await?;
//! ```

use std::sync::Arc;

use mnemos_core::memory::{EmbeddingProvider, HashingEmbedder};

use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::SDKResult;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSIONS: usize = 384;

/// Build the provider selected by the configuration
pub fn build_embedder(config: &EmbeddingConfig) -> SDKResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimension)?)),
        #[cfg(feature = "embeddings")]
        EmbeddingProviderKind::Fastembed => Ok(Arc::new(FastEmbedProvider::new())),
        #[cfg(not(feature = "embeddings"))]
        EmbeddingProviderKind::Fastembed => Err(crate::config::ConfigValidationError::InvalidValue {
            field: "embedding.provider".into(),
            message: "fastembed requires the `embeddings` feature".into(),
        }
        .into()),
    }
}

#[cfg(feature = "embeddings")]
pub use fast::FastEmbedProvider;

#[cfg(feature = "embeddings")]
mod fast {
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tokio::sync::RwLock;

    use mnemos_core::memory::EmbeddingProvider;
    use mnemos_core::{Error, Result};

    use super::EMBEDDING_DIMENSIONS;

    /// fastembed-backed provider
    pub struct FastEmbedProvider {
        model: RwLock<Option<TextEmbedding>>,
    }

    impl Default for FastEmbedProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FastEmbedProvider {
        pub fn new() -> Self {
            Self {
                model: RwLock::new(None),
            }
        }

        /// Initialize the embedding model (lazy loading)
        async fn ensure_model(&self) -> Result<()> {
            if self.model.read().await.is_some() {
                return Ok(());
            }

            let mut model_guard = self.model.write().await;
            if model_guard.is_some() {
                return Ok(());
            }

            tracing::info!("Loading embedding model: all-MiniLM-L6-v2");
            let start = std::time::Instant::now();

            let mut init_options = InitOptions::default();
            init_options.model_name = EmbeddingModel::AllMiniLML6V2;
            init_options.show_download_progress = false;

            let model = TextEmbedding::try_new(init_options)
                .map_err(|e| Error::Embedding(format!("Failed to load embedding model: {}", e)))?;

            tracing::info!("Embedding model loaded in {:?}", start.elapsed());
            *model_guard = Some(model);
            Ok(())
        }

        /// Check if the model is loaded
        pub async fn is_loaded(&self) -> bool {
            self.model.read().await.is_some()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedProvider {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.encode_batch(&[text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::Embedding("No embedding generated".into()))
        }

        async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.ensure_model().await?;

            let model_guard = self.model.read().await;
            let model = model_guard
                .as_ref()
                .ok_or_else(|| Error::Embedding("Embedding model not initialized".into()))?;

            model
                .embed(texts.to_vec(), None)
                .map_err(|e| Error::Embedding(format!("Failed to generate embeddings: {}", e)))
        }

        fn dimension(&self) -> usize {
            EMBEDDING_DIMENSIONS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hashing_provider_from_config() {
        let embedder = build_embedder(&EmbeddingConfig {
            provider: EmbeddingProviderKind::Hashing,
            dimension: 32,
        })
        .unwrap();

        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.encode("hello world").await.unwrap().len(), 32);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let result = build_embedder(&EmbeddingConfig {
            provider: EmbeddingProviderKind::Hashing,
            dimension: 0,
        });
        assert!(result.err().unwrap().is_validation());
    }

    #[cfg(not(feature = "embeddings"))]
    #[test]
    fn test_fastembed_requires_feature() {
        let result = build_embedder(&EmbeddingConfig {
            provider: EmbeddingProviderKind::Fastembed,
            dimension: EMBEDDING_DIMENSIONS,
        });
        assert!(result.err().unwrap().is_validation());
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore = "requires model download (~90MB)"]
    async fn test_embed_single() {
        let provider = FastEmbedProvider::new();
        let vector = provider.encode("hello world").await.unwrap();
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(provider.is_loaded().await);
    }

    #[cfg(feature = "embeddings")]
    #[tokio::test]
    #[ignore = "requires model download (~90MB)"]
    async fn test_embed_batch() {
        let provider = FastEmbedProvider::new();
        let vectors = provider.encode_batch(&["hello", "world", "test"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == EMBEDDING_DIMENSIONS));
    }
}
