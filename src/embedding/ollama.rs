use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
};
use reqwest::Url;

pub(super) const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

/// Embedding client calling a local Ollama runtime through `/api/embed`.
pub struct OllamaEmbeddingClient {
    client: Ollama,
    model: String,
    dimension: usize,
}

impl OllamaEmbeddingClient {
    /// Create a client for `model` served at `base_url`.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, EmbeddingClientError> {
        let url = Url::parse(base_url.trim()).map_err(|error| {
            EmbeddingClientError::InvalidConfiguration(format!(
                "invalid Ollama URL '{base_url}': {error}"
            ))
        })?;
        let host = url.host_str().ok_or_else(|| {
            EmbeddingClientError::InvalidConfiguration(format!(
                "Ollama URL '{base_url}' has no host"
            ))
        })?;
        let port = url.port_or_known_default().unwrap_or(DEFAULT_OLLAMA_PORT);

        let model = model.into();
        if model.trim().is_empty() {
            return Err(EmbeddingClientError::InvalidConfiguration(
                "embedding model must not be empty".to_string(),
            ));
        }
        if dimension == 0 {
            return Err(EmbeddingClientError::InvalidConfiguration(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            client: Ollama::new(format!("{}://{host}", url.scheme()), port),
            model,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        tracing::debug!(
            provider = "ollama",
            model = %self.model,
            dimension = self.dimension,
            texts = expected,
            "Generating embeddings"
        );

        let request =
            GenerateEmbeddingsRequest::new(self.model.clone(), EmbeddingsInput::Multiple(texts));
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|error| {
                tracing::error!(model = %self.model, error = %error, "Ollama embedding failed");
                EmbeddingClientError::GenerationFailed(error.to_string())
            })?;

        let embeddings = response.embeddings;
        if embeddings.len() != expected {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "expected {expected} embeddings, received {}",
                embeddings.len()
            )));
        }
        if let Some(vector) = embeddings.iter().find(|vector| vector.len() != self.dimension) {
            return Err(EmbeddingClientError::UnexpectedDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}
