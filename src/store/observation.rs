//! Observation hooks: a tracing span per store operation plus process-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Store operation being observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Document upsert.
    Add,
    /// Document deletion.
    Delete,
    /// Similarity search.
    Query,
}

impl Operation {
    /// Operation name recorded on spans.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Query => "query",
        }
    }
}

/// Attributes describing a single store operation.
#[derive(Debug, Clone)]
pub struct ObservationContext {
    /// Backend provider name.
    pub provider: &'static str,
    /// Operation being performed.
    pub operation: Operation,
    /// Index or collection name.
    pub collection: String,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Similarity metric, known only when the store created the index.
    pub similarity_metric: Option<&'static str>,
}

impl ObservationContext {
    /// Span wrapping the operation.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "vector_store",
            provider = self.provider,
            operation = self.operation.as_str(),
            collection = %self.collection,
            dimensions = self.dimensions,
            similarity_metric = self.similarity_metric.unwrap_or("unknown"),
        )
    }
}

/// Thread-safe counters describing store activity.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    documents_added: AtomicU64,
    delete_requests: AtomicU64,
    documents_deleted: AtomicU64,
    queries: AtomicU64,
    hits_returned: AtomicU64,
}

impl StoreMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful upsert batch.
    pub fn record_added(&self, documents: u64) {
        self.documents_added.fetch_add(documents, Ordering::Relaxed);
    }

    /// Record a delete request and how many records the backend confirmed.
    pub fn record_deleted(&self, confirmed: u64) {
        self.delete_requests.fetch_add(1, Ordering::Relaxed);
        self.documents_deleted.fetch_add(confirmed, Ordering::Relaxed);
    }

    /// Record a completed query and the hits kept after thresholding.
    pub fn record_query(&self, hits: u64) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.hits_returned.fetch_add(hits, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_added: self.documents_added.load(Ordering::Relaxed),
            delete_requests: self.delete_requests.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            hits_returned: self.hits_returned.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of store counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents upserted since startup.
    pub documents_added: u64,
    /// Delete requests issued.
    pub delete_requests: u64,
    /// Records the backend confirmed deleted.
    pub documents_deleted: u64,
    /// Similarity searches completed.
    pub queries: u64,
    /// Hits returned across all searches.
    pub hits_returned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_activity() {
        let metrics = StoreMetrics::new();
        metrics.record_added(3);
        metrics.record_added(2);
        metrics.record_deleted(1);
        metrics.record_query(4);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                documents_added: 5,
                delete_requests: 1,
                documents_deleted: 1,
                queries: 1,
                hits_returned: 4,
            }
        );
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(StoreMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
