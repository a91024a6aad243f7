use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Deterministic offline embedding client based on token feature hashing.
///
/// Each lowercase word is hashed with SHA-256; the digest picks a slot and a sign. Vectors are
/// L2-normalised, so texts sharing words have a positive cosine similarity.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing `dimension`-sized vectors.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut slot_bytes = [0_u8; 8];
            slot_bytes.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(slot_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[slot] += sign;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::InvalidConfiguration(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(
            provider = "hash",
            dimension = self.dimension,
            texts = texts.len(),
            "Generating embeddings"
        );

        Ok(texts.iter().map(|text| self.encode(text)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }
}
