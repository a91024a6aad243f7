//! Documents exchanged with vector stores.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key holding `1 - score` on every similarity search hit.
pub const DISTANCE_METADATA_KEY: &str = "distance";

/// A unit of text stored in a vector index together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier unique within the backing index.
    pub id: String,
    /// Raw text that is embedded and returned on search.
    pub content: String,
    /// Arbitrary metadata persisted as a JSON blob.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Embedding vector, populated by the store before persistence when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Normalized similarity score in `[0, 1]`, set on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Document {
    /// Create a document with a random UUID identifier and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self::builder().content(content).build()
    }

    /// Create a document with a random identifier and the given metadata.
    pub fn with_metadata(content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self::builder().content(content).metadata(metadata).build()
    }

    /// Start building a document.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }
}

/// Builder for [`Document`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    id: Option<String>,
    content: String,
    metadata: Map<String, Value>,
    embedding: Option<Vec<f32>>,
    score: Option<f64>,
}

impl DocumentBuilder {
    /// Use an explicit identifier instead of a generated one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the document text.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Replace the metadata map.
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Insert a single metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach a precomputed embedding.
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Attach a similarity score.
    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Finish the document, generating an identifier when none was given.
    pub fn build(self) -> Document {
        Document {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            content: self.content,
            metadata: self.metadata,
            embedding: self.embedding,
            score: self.score,
        }
    }
}
