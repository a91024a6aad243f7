//! Seam between the store and a concrete search service.

use async_trait::async_trait;

use super::types::{
    BackendError, IndexRecord, IndexSchema, MetadataField, RecordOutcome, ScoredRecord,
    SimilarityMetric, VectorQuery,
};
use crate::filter::FilterExpressionConverter;

/// Converter handed out by a backend for its native filter type.
pub type BoxedFilterConverter<F> = Box<dyn FilterExpressionConverter<Output = F>>;

/// Operations a search service must expose to back a [`crate::store::VectorStore`].
///
/// Implementations normalize scores into `[0, 1]` before returning them, and report per-record
/// outcomes for batch writes.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Native filter representation, e.g. an OData string.
    type Filter: Send + Sync + 'static;

    /// Provider name used in logs and observations.
    fn provider(&self) -> &'static str;

    /// Metric applied to the vector field.
    fn similarity_metric(&self) -> SimilarityMetric {
        SimilarityMetric::Cosine
    }

    /// Converter from portable expressions to [`Self::Filter`] over the declared fields.
    fn filter_converter(&self, fields: &[MetadataField]) -> BoxedFilterConverter<Self::Filter>;

    /// Create or update the index described by `schema`.
    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), BackendError>;

    /// Insert or replace records by key.
    async fn upsert(
        &self,
        index: &str,
        records: Vec<IndexRecord>,
    ) -> Result<Vec<RecordOutcome>, BackendError>;

    /// Delete records by key.
    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<RecordOutcome>, BackendError>;

    /// Return up to `query.top_k` nearest records, best first.
    async fn query(
        &self,
        index: &str,
        query: VectorQuery<Self::Filter>,
    ) -> Result<Vec<ScoredRecord>, BackendError>;
}
