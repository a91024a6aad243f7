//! Embedding providers and the batching strategy deciding how documents are grouped into
//! provider requests.

mod batching;
mod hashing;
mod ollama;

pub use batching::{
    BatchingError, BatchingStrategy, DEFAULT_MAX_INPUT_TOKENS, DEFAULT_RESERVE_PERCENTAGE,
    TokenCountBatchingStrategy,
};
pub use hashing::HashEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider configuration is unusable.
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfiguration(String),
    /// Provider returned vectors of an unexpected shape.
    #[error("Embedding provider returned {actual} values per vector, expected {expected}")]
    UnexpectedDimension {
        /// Configured dimension.
        expected: usize,
        /// Dimension received.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Dimensionality of every produced vector.
    fn dimensions(&self) -> usize;
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Hash => Ok(Box::new(HashEmbeddingClient::new(
            config.embedding_dimension,
        ))),
        EmbeddingProvider::Ollama => {
            let url = config
                .ollama_url
                .as_deref()
                .unwrap_or(ollama::DEFAULT_OLLAMA_URL);
            let client = OllamaEmbeddingClient::new(
                url,
                config.embedding_model.clone(),
                config.embedding_dimension,
            )?;
            Ok(Box::new(client))
        }
    }
}
