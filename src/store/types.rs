//! Core data types and error definitions for the vector store adapter.

use crate::{
    embedding::{BatchingError, EmbeddingClientError},
    filter::{Expression, FilterError},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Boxed error returned by [`crate::store::SearchBackend`] implementations.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Name of the key field in every index.
pub const ID_FIELD_NAME: &str = "id";
/// Name of the raw text field.
pub const CONTENT_FIELD_NAME: &str = "content";
/// Name of the vector field.
pub const EMBEDDING_FIELD_NAME: &str = "embedding";
/// Name of the JSON metadata blob field.
pub const METADATA_FIELD_NAME: &str = "metadata";
/// Prefix applied to projected filterable metadata fields.
pub const METADATA_FIELD_PREFIX: &str = "meta_";

/// Result count used by [`SearchRequest::query`].
pub const DEFAULT_TOP_K: usize = 4;
/// Threshold that accepts every hit.
pub const SIMILARITY_THRESHOLD_ACCEPT_ALL: f64 = 0.0;

/// Errors emitted by [`crate::store::VectorStore`].
#[derive(Debug, Error)]
pub enum VectorStoreError {
    /// Caller supplied an argument the store cannot accept.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Backend reported a failure for an individual record.
    #[error("Document with key {key} did not upload successfully: {message}")]
    UploadFailed {
        /// Identifier of the failing record.
        key: String,
        /// Diagnostic reported by the backend.
        message: String,
    },
    /// Embedding length does not match the configured index dimensionality.
    #[error("Embedding dimension mismatch for '{id}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Document (or query) the embedding belongs to.
        id: String,
        /// Dimension configured for the index.
        expected: usize,
        /// Dimension actually produced.
        actual: usize,
    },
    /// Embedding provider returned a different number of vectors than inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    EmbeddingCount {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Stored metadata blob could not be decoded.
    #[error("Stored metadata for '{id}' is not a JSON object: {source}")]
    InvalidMetadata {
        /// Identifier of the affected record.
        id: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
    /// Index creation failed during startup.
    #[error("Failed to initialize schema for index '{index}': {source}")]
    SchemaInitialization {
        /// Index being created.
        index: String,
        /// Backend error.
        #[source]
        source: BackendError,
    },
    /// Backend request failed as a whole.
    #[error("{provider} request failed: {source}")]
    Backend {
        /// Backend provider name.
        provider: &'static str,
        /// Backend error.
        #[source]
        source: BackendError,
    },
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Documents could not be grouped into embedding batches.
    #[error(transparent)]
    Batching(#[from] BatchingError),
    /// Filter expression could not be converted for the backend.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Backend-neutral type of a filterable metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 string.
    Text,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Double precision float.
    Double,
    /// Boolean.
    Boolean,
    /// RFC 3339 timestamp.
    DateTime,
}

impl std::str::FromStr for FieldType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text),
            "int32" | "int" => Ok(Self::Int32),
            "int64" | "long" => Ok(Self::Int64),
            "double" | "decimal" => Ok(Self::Double),
            "bool" | "boolean" => Ok(Self::Boolean),
            "date" | "datetime" => Ok(Self::DateTime),
            _ => Err(()),
        }
    }
}

/// Metadata key projected into a top-level filterable index field.
///
/// Only declared fields can appear in filter expressions. Adding a field later requires
/// re-adding the documents that should carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    /// Metadata key as it appears in [`crate::document::Document::metadata`].
    pub name: String,
    /// Type of the projected field.
    pub field_type: FieldType,
}

impl MetadataField {
    /// Declare a field with an explicit type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// String field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// 32-bit integer field.
    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int32)
    }

    /// 64-bit integer field.
    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int64)
    }

    /// Double precision field.
    pub fn decimal(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Double)
    }

    /// Boolean field.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Timestamp field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// Name of the projected top-level field, `meta_<name>`.
    pub fn indexed_name(&self) -> String {
        format!("{METADATA_FIELD_PREFIX}{}", self.name)
    }
}

/// Parameters of a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Natural language query text to embed.
    pub query: String,
    /// Maximum number of results.
    pub top_k: usize,
    /// Minimum normalized score a hit must reach, in `[0, 1]`.
    pub similarity_threshold: f64,
    /// Optional metadata predicate.
    pub filter_expression: Option<Expression>,
    /// Precomputed query embedding, skipping the embedding provider.
    pub query_embedding: Option<Vec<f32>>,
}

impl SearchRequest {
    /// Request with [`DEFAULT_TOP_K`] results and an accept-all threshold.
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            similarity_threshold: SIMILARITY_THRESHOLD_ACCEPT_ALL,
            filter_expression: None,
            query_embedding: None,
        }
    }

    /// Limit the number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Drop hits scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Accept every hit regardless of score.
    pub fn with_similarity_threshold_all(self) -> Self {
        self.with_similarity_threshold(SIMILARITY_THRESHOLD_ACCEPT_ALL)
    }

    /// Restrict results with a metadata predicate.
    pub fn with_filter_expression(mut self, expression: Expression) -> Self {
        self.filter_expression = Some(expression);
        self
    }

    /// Restrict results with a predicate in text form, e.g. `country == 'UK' && year >= 2020`.
    pub fn with_filter_text(self, text: &str) -> Result<Self, FilterError> {
        Ok(self.with_filter_expression(crate::filter::parse(text)?))
    }

    /// Reuse an embedding computed elsewhere for the query text.
    pub fn with_query_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.query_embedding = Some(embedding);
        self
    }
}

/// Similarity metric configured on the vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    /// Cosine similarity.
    Cosine,
}

impl SimilarityMetric {
    /// Lowercase metric name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
        }
    }
}

/// HNSW parameters applied when the store creates the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParameters {
    /// Bi-directional links per node.
    pub m: u32,
    /// Candidate list size during construction.
    pub ef_construction: u32,
    /// Candidate list size during search.
    pub ef_search: u32,
}

impl Default for HnswParameters {
    fn default() -> Self {
        Self {
            m: 4,
            ef_construction: 400,
            ef_search: 1000,
        }
    }
}

/// Storage type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaDataType {
    /// Scalar value.
    Scalar(FieldType),
    /// Collection of single precision floats holding the embedding.
    Vector {
        /// Number of components.
        dimensions: usize,
    },
}

/// Field of an [`IndexSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// Storage type.
    pub data_type: SchemaDataType,
    /// Document key.
    pub key: bool,
    /// Usable in filters.
    pub filterable: bool,
    /// Usable for ordering.
    pub sortable: bool,
    /// Included in full-text or vector search.
    pub searchable: bool,
    /// Usable for facet counts.
    pub facetable: bool,
}

impl SchemaField {
    fn scalar(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type: SchemaDataType::Scalar(field_type),
            key: false,
            filterable: false,
            sortable: false,
            searchable: false,
            facetable: false,
        }
    }
}

/// Shape of the backing index or collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    /// Index or collection name.
    pub name: String,
    /// Field definitions, key first.
    pub fields: Vec<SchemaField>,
    /// Similarity metric of the vector field.
    pub metric: SimilarityMetric,
    /// Vector index parameters.
    pub hnsw: HnswParameters,
}

impl IndexSchema {
    /// Standard layout: key, vector, content, metadata blob, and one field per declared
    /// metadata field.
    pub fn standard(name: &str, dimensions: usize, metadata_fields: &[MetadataField]) -> Self {
        let mut fields = vec![
            SchemaField {
                key: true,
                filterable: true,
                sortable: true,
                ..SchemaField::scalar(ID_FIELD_NAME, FieldType::Text)
            },
            SchemaField {
                data_type: SchemaDataType::Vector { dimensions },
                searchable: true,
                ..SchemaField::scalar(EMBEDDING_FIELD_NAME, FieldType::Double)
            },
            SchemaField {
                searchable: true,
                filterable: true,
                ..SchemaField::scalar(CONTENT_FIELD_NAME, FieldType::Text)
            },
            SchemaField {
                searchable: true,
                filterable: true,
                ..SchemaField::scalar(METADATA_FIELD_NAME, FieldType::Text)
            },
        ];

        fields.extend(metadata_fields.iter().map(|field| SchemaField {
            filterable: true,
            facetable: true,
            ..SchemaField::scalar(field.indexed_name(), field.field_type)
        }));

        Self {
            name: name.to_string(),
            fields,
            metric: SimilarityMetric::Cosine,
            hnsw: HnswParameters::default(),
        }
    }

    /// Dimension of the vector field, if the schema has one.
    pub fn dimensions(&self) -> Option<usize> {
        self.fields.iter().find_map(|field| match field.data_type {
            SchemaDataType::Vector { dimensions } => Some(dimensions),
            SchemaDataType::Scalar(_) => None,
        })
    }

    /// Projected metadata fields and their types.
    pub fn metadata_fields(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().filter_map(|field| match field.data_type {
            SchemaDataType::Scalar(field_type) if field.name.starts_with(METADATA_FIELD_PREFIX) => {
                Some((field.name.as_str(), field_type))
            }
            _ => None,
        })
    }
}

/// Backend-ready record built from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    /// Document identifier.
    pub id: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Raw text.
    pub content: String,
    /// Metadata serialized as a JSON object string.
    pub metadata: String,
    /// Projected `meta_<name>` values present on the document.
    pub fields: Map<String, Value>,
}

/// Per-record result of an upsert or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Record identifier.
    pub key: String,
    /// Whether the backend applied the operation.
    pub succeeded: bool,
    /// Diagnostic reported on failure.
    pub error_message: Option<String>,
}

impl RecordOutcome {
    /// Successful outcome.
    pub fn success(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            error_message: None,
        }
    }

    /// Failed outcome.
    pub fn failure(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: false,
            error_message: Some(message.into()),
        }
    }
}

/// Nearest-neighbour query handed to a backend.
#[derive(Debug, Clone)]
pub struct VectorQuery<F> {
    /// Query embedding.
    pub embedding: Vec<f32>,
    /// Maximum number of hits.
    pub top_k: usize,
    /// Native filter, already converted.
    pub filter: Option<F>,
}

/// Hit returned by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Record identifier.
    pub id: String,
    /// Stored raw text.
    pub content: Option<String>,
    /// Stored metadata blob.
    pub metadata: Option<String>,
    /// Similarity normalized to `[0, 1]`.
    pub score: f64,
}
