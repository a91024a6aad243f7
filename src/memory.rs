//! Process-local brute-force backend.
//!
//! Records live in a `tokio` [`RwLock`] keyed by index name. Queries score every record with
//! cosine similarity and apply a [`MetadataFilter`] against the projected fields, so behaviour
//! matches the remote backends closely enough for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::filter::{MetadataFilter, MetadataFilterConverter};
use crate::store::{
    BackendError, BoxedFilterConverter, IndexRecord, IndexSchema, MetadataField, RecordOutcome,
    ScoredRecord, SearchBackend, VectorQuery,
};

/// Errors returned by [`InMemoryBackend`].
#[derive(Debug, Error)]
pub enum MemoryBackendError {
    /// Record does not match the dimension the index was created with.
    #[error("Record '{id}' has {actual} dimensions, index '{index}' expects {expected}")]
    DimensionMismatch {
        /// Index name.
        index: String,
        /// Record identifier.
        id: String,
        /// Dimension of the index.
        expected: usize,
        /// Dimension of the record.
        actual: usize,
    },
}

#[derive(Debug, Default)]
struct MemoryIndex {
    dimensions: Option<usize>,
    records: HashMap<String, IndexRecord>,
}

/// Brute-force cosine index held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored under `index`.
    pub async fn len(&self, index: &str) -> usize {
        self.indexes
            .read()
            .await
            .get(index)
            .map_or(0, |index| index.records.len())
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    type Filter = MetadataFilter;

    fn provider(&self) -> &'static str {
        "memory"
    }

    fn filter_converter(&self, fields: &[MetadataField]) -> BoxedFilterConverter<MetadataFilter> {
        Box::new(MetadataFilterConverter::new(fields))
    }

    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), BackendError> {
        let mut indexes = self.indexes.write().await;
        let index = indexes.entry(schema.name.clone()).or_default();
        index.dimensions = schema.dimensions();
        tracing::debug!(index = %schema.name, dimensions = ?index.dimensions, "Memory index ensured");
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        records: Vec<IndexRecord>,
    ) -> Result<Vec<RecordOutcome>, BackendError> {
        let mut indexes = self.indexes.write().await;
        // Unknown indexes are created on first write, sized by the first record.
        let target = indexes.entry(index.to_string()).or_default();
        let expected = match target.dimensions {
            Some(dimensions) => dimensions,
            None => records.first().map_or(0, |record| record.embedding.len()),
        };

        if let Some(record) = records
            .iter()
            .find(|record| record.embedding.len() != expected)
        {
            return Err(Box::new(MemoryBackendError::DimensionMismatch {
                index: index.to_string(),
                id: record.id.clone(),
                expected,
                actual: record.embedding.len(),
            }));
        }

        target.dimensions.get_or_insert(expected);
        let outcomes = records
            .iter()
            .map(|record| RecordOutcome::success(record.id.clone()))
            .collect();
        for record in records {
            target.records.insert(record.id.clone(), record);
        }
        Ok(outcomes)
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<RecordOutcome>, BackendError> {
        let mut indexes = self.indexes.write().await;
        if let Some(target) = indexes.get_mut(index) {
            for id in ids {
                target.records.remove(id);
            }
        }
        Ok(ids.iter().map(RecordOutcome::success).collect())
    }

    async fn query(
        &self,
        index: &str,
        query: VectorQuery<MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        let indexes = self.indexes.read().await;
        let Some(target) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredRecord> = target
            .records
            .values()
            .filter(|record| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(&record.fields))
            })
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                content: Some(record.content.clone()),
                metadata: Some(record.metadata.clone()),
                score: (cosine_similarity(&query.embedding, &record.embedding) + 1.0) / 2.0,
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(query.top_k);
        Ok(hits)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
