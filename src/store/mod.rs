//! Vector store adapter: embeds documents, writes them through a [`SearchBackend`], and maps
//! similarity search results back into documents.

mod backend;
pub mod observation;
mod service;
pub mod types;

pub use backend::{BoxedFilterConverter, SearchBackend};
pub use observation::{MetricsSnapshot, ObservationContext, Operation, StoreMetrics};
pub use service::{VectorStore, VectorStoreBuilder, VectorStoreOptions};
pub use types::{
    BackendError, FieldType, HnswParameters, IndexRecord, IndexSchema, MetadataField,
    RecordOutcome, SchemaDataType, SchemaField, ScoredRecord, SearchRequest, SimilarityMetric,
    VectorQuery, VectorStoreError,
};
