//! Store service coordinating embedding, record mapping, and backend calls.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Instrument;

use super::{
    backend::{BoxedFilterConverter, SearchBackend},
    observation::{MetricsSnapshot, ObservationContext, Operation, StoreMetrics},
    types::{
        BackendError, DEFAULT_TOP_K, IndexRecord, IndexSchema, MetadataField, ScoredRecord,
        SearchRequest, VectorQuery, VectorStoreError,
    },
};
use crate::{
    document::{DISTANCE_METADATA_KEY, Document},
    embedding::{BatchingStrategy, EmbeddingClient, TokenCountBatchingStrategy},
};

const DEFAULT_INDEX_NAME: &str = "rusty_vector_store";

/// Settings fixed for the lifetime of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreOptions {
    /// Index or collection name.
    pub index_name: String,
    /// Result count used by [`VectorStore::similarity_search_query`].
    pub default_top_k: usize,
    /// Threshold used by [`VectorStore::similarity_search_query`].
    pub default_similarity_threshold: f64,
    /// Metadata keys projected into filterable fields.
    pub filter_metadata_fields: Vec<MetadataField>,
    /// Create or update the index schema when the store is built.
    pub initialize_schema: bool,
}

impl Default for VectorStoreOptions {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX_NAME.to_string(),
            default_top_k: DEFAULT_TOP_K,
            default_similarity_threshold: 0.0,
            filter_metadata_fields: Vec::new(),
            initialize_schema: false,
        }
    }
}

/// Vector store bound to one index of a [`SearchBackend`].
///
/// Documents lacking an embedding are embedded in batches before upload; metadata is stored as
/// a JSON blob with declared [`MetadataField`]s projected into filterable top-level fields.
/// Build one with [`VectorStore::builder`], which also runs schema bootstrap.
pub struct VectorStore<B: SearchBackend> {
    backend: B,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    batching_strategy: Box<dyn BatchingStrategy>,
    filter_converter: BoxedFilterConverter<B::Filter>,
    options: VectorStoreOptions,
    metrics: Arc<StoreMetrics>,
}

/// Builder for [`VectorStore`].
pub struct VectorStoreBuilder<B: SearchBackend> {
    backend: B,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    batching_strategy: Option<Box<dyn BatchingStrategy>>,
    options: VectorStoreOptions,
    metrics: Option<Arc<StoreMetrics>>,
}

impl<B: SearchBackend> VectorStoreBuilder<B> {
    /// Index or collection name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.options.index_name = name.into();
        self
    }

    /// Default result count.
    pub fn default_top_k(mut self, top_k: usize) -> Self {
        self.options.default_top_k = top_k;
        self
    }

    /// Default similarity threshold, within `[0, 1]`.
    pub fn default_similarity_threshold(mut self, threshold: f64) -> Self {
        self.options.default_similarity_threshold = threshold;
        self
    }

    /// Metadata fields usable in filter expressions.
    pub fn filter_metadata_fields(mut self, fields: Vec<MetadataField>) -> Self {
        self.options.filter_metadata_fields = fields;
        self
    }

    /// Create the index schema during [`Self::build`].
    pub fn initialize_schema(mut self, enabled: bool) -> Self {
        self.options.initialize_schema = enabled;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: VectorStoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Strategy grouping documents into embedding requests.
    pub fn batching_strategy(mut self, strategy: impl BatchingStrategy + 'static) -> Self {
        self.batching_strategy = Some(Box::new(strategy));
        self
    }

    /// Share a metrics registry with other components.
    pub fn metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate options, bind the index, and run schema bootstrap when enabled.
    pub async fn build(self) -> Result<VectorStore<B>, VectorStoreError> {
        let options = self.options;
        if options.index_name.trim().is_empty() {
            return Err(VectorStoreError::InvalidArgument(
                "the index name can not be empty".into(),
            ));
        }
        if options.default_top_k == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "the default top_k must be greater than zero".into(),
            ));
        }
        validate_threshold(options.default_similarity_threshold)?;

        let filter_converter = self
            .backend
            .filter_converter(&options.filter_metadata_fields);

        let store = VectorStore {
            backend: self.backend,
            embedding_client: self.embedding_client,
            batching_strategy: self
                .batching_strategy
                .unwrap_or_else(|| Box::new(TokenCountBatchingStrategy::default())),
            filter_converter,
            options,
            metrics: self.metrics.unwrap_or_default(),
        };

        store.initialize_schema().await?;
        Ok(store)
    }
}

impl<B: SearchBackend> VectorStore<B> {
    /// Start building a store over `backend`.
    pub fn builder(
        backend: B,
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    ) -> VectorStoreBuilder<B> {
        VectorStoreBuilder {
            backend,
            embedding_client,
            batching_strategy: None,
            options: VectorStoreOptions::default(),
            metrics: None,
        }
    }

    /// Options the store was built with.
    pub fn options(&self) -> &VectorStoreOptions {
        &self.options
    }

    /// Underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Define the index shape when schema initialization is enabled, otherwise bind to the
    /// existing index by name.
    pub async fn initialize_schema(&self) -> Result<(), VectorStoreError> {
        let index = &self.options.index_name;
        if !self.options.initialize_schema {
            tracing::debug!(
                provider = self.backend.provider(),
                index = %index,
                "Binding to existing index"
            );
            return Ok(());
        }

        let dimensions = self.embedding_client.dimensions();
        let schema = IndexSchema::standard(index, dimensions, &self.options.filter_metadata_fields);
        self.backend
            .ensure_index(&schema)
            .await
            .map_err(|source| VectorStoreError::SchemaInitialization {
                index: index.clone(),
                source,
            })?;

        tracing::info!(
            provider = self.backend.provider(),
            index = %index,
            dimensions,
            filter_fields = self.options.filter_metadata_fields.len(),
            "Created search index"
        );
        Ok(())
    }

    /// Embed and upsert documents.
    ///
    /// An empty list is a no-op. Fails with [`VectorStoreError::UploadFailed`] naming the first
    /// record the backend rejected.
    pub async fn add(&self, documents: Vec<Document>) -> Result<(), VectorStoreError> {
        if documents.is_empty() {
            tracing::debug!("No documents to add");
            return Ok(());
        }
        if documents.iter().any(|document| document.id.trim().is_empty()) {
            return Err(VectorStoreError::InvalidArgument(
                "document ids must not be empty".into(),
            ));
        }

        let context = self.observation(Operation::Add);
        async {
            let embeddings = self.embed_documents(&documents).await?;
            let records: Vec<IndexRecord> = documents
                .iter()
                .zip(embeddings)
                .map(|(document, embedding)| self.to_record(document, embedding))
                .collect();

            let count = records.len();
            let outcomes = self
                .backend
                .upsert(&self.options.index_name, records)
                .await
                .map_err(|source| self.backend_error(source))?;

            if let Some(failed) = outcomes.iter().find(|outcome| !outcome.succeeded) {
                tracing::error!(key = %failed.key, "Document upload rejected");
                return Err(VectorStoreError::UploadFailed {
                    key: failed.key.clone(),
                    message: failed
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "no diagnostic reported".into()),
                });
            }

            self.metrics.record_added(count as u64);
            tracing::info!(documents = count, "Documents added");
            Ok(())
        }
        .instrument(context.span())
        .await
    }

    /// Delete documents by id.
    ///
    /// Returns `true` only when the backend confirmed every deletion. Ids that do not exist
    /// are not an error.
    pub async fn delete(&self, ids: &[String]) -> Result<bool, VectorStoreError> {
        if ids.is_empty() {
            return Ok(true);
        }

        let context = self.observation(Operation::Delete);
        async {
            let outcomes = self
                .backend
                .delete(&self.options.index_name, ids)
                .await
                .map_err(|source| self.backend_error(source))?;

            let confirmed = outcomes.iter().filter(|outcome| outcome.succeeded).count();
            let success = confirmed == outcomes.len();
            self.metrics.record_deleted(confirmed as u64);
            if success {
                tracing::info!(requested = ids.len(), "Documents deleted");
            } else {
                tracing::warn!(
                    requested = ids.len(),
                    confirmed,
                    "Some documents were not deleted"
                );
            }
            Ok(success)
        }
        .instrument(context.span())
        .await
    }

    /// Search with the store's default result count and threshold.
    pub async fn similarity_search_query(
        &self,
        query: &str,
    ) -> Result<Vec<Document>, VectorStoreError> {
        self.similarity_search(
            SearchRequest::query(query)
                .with_top_k(self.options.default_top_k)
                .with_similarity_threshold(self.options.default_similarity_threshold),
        )
        .await
    }

    /// Nearest-neighbour search with optional metadata filtering.
    ///
    /// Hits scoring below the request threshold are dropped. Each returned document carries its
    /// score and a `distance` metadata entry equal to `1 - score`.
    pub async fn similarity_search(
        &self,
        request: SearchRequest,
    ) -> Result<Vec<Document>, VectorStoreError> {
        let SearchRequest {
            query,
            top_k,
            similarity_threshold,
            filter_expression,
            query_embedding,
        } = request;
        validate_threshold(similarity_threshold)?;
        if top_k == 0 {
            return Err(VectorStoreError::InvalidArgument(
                "top_k must be greater than zero".into(),
            ));
        }

        let filter = filter_expression
            .as_ref()
            .map(|expression| self.filter_converter.convert_expression(expression))
            .transpose()?;

        let context = self.observation(Operation::Query);
        async {
            let embedding = match query_embedding {
                Some(embedding) => embedding,
                None => {
                    let mut vectors = self
                        .embedding_client
                        .generate_embeddings(vec![query])
                        .await?;
                    if vectors.len() != 1 {
                        return Err(VectorStoreError::EmbeddingCount {
                            expected: 1,
                            actual: vectors.len(),
                        });
                    }
                    vectors.remove(0)
                }
            };
            self.check_dimension("query", &embedding)?;

            let hits = self
                .backend
                .query(
                    &self.options.index_name,
                    VectorQuery {
                        embedding,
                        top_k,
                        filter,
                    },
                )
                .await
                .map_err(|source| self.backend_error(source))?;

            let received = hits.len();
            let documents = hits
                .into_iter()
                .filter(|hit| hit.score >= similarity_threshold)
                .map(to_document)
                .collect::<Result<Vec<_>, _>>()?;

            self.metrics.record_query(documents.len() as u64);
            tracing::debug!(
                top_k,
                threshold = similarity_threshold,
                received,
                returned = documents.len(),
                "Similarity search completed"
            );
            Ok(documents)
        }
        .instrument(context.span())
        .await
    }

    async fn embed_documents(
        &self,
        documents: &[Document],
    ) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        let mut embeddings: Vec<Option<Vec<f32>>> = documents
            .iter()
            .map(|document| document.embedding.clone())
            .collect();

        let pending: Vec<usize> = embeddings
            .iter()
            .enumerate()
            .filter_map(|(idx, embedding)| embedding.is_none().then_some(idx))
            .collect();

        if !pending.is_empty() {
            let texts: Vec<&str> = pending
                .iter()
                .map(|&idx| documents[idx].content.as_str())
                .collect();
            let batches = self.batching_strategy.batch(&texts)?;
            tracing::debug!(
                documents = pending.len(),
                batches = batches.len(),
                "Embedding documents"
            );

            for batch in batches {
                let inputs: Vec<String> = batch.iter().map(|&pos| texts[pos].to_string()).collect();
                let vectors = self.embedding_client.generate_embeddings(inputs).await?;
                if vectors.len() != batch.len() {
                    return Err(VectorStoreError::EmbeddingCount {
                        expected: batch.len(),
                        actual: vectors.len(),
                    });
                }
                for (pos, vector) in batch.into_iter().zip(vectors) {
                    embeddings[pending[pos]] = Some(vector);
                }
            }
        }

        documents
            .iter()
            .zip(embeddings)
            .map(|(document, embedding)| {
                let embedding = embedding.unwrap_or_default();
                self.check_dimension(&document.id, &embedding)?;
                Ok(embedding)
            })
            .collect()
    }

    fn to_record(&self, document: &Document, embedding: Vec<f32>) -> IndexRecord {
        let fields: Map<String, Value> = self
            .options
            .filter_metadata_fields
            .iter()
            .filter_map(|field| {
                document
                    .metadata
                    .get(&field.name)
                    .map(|value| (field.indexed_name(), value.clone()))
            })
            .collect();

        IndexRecord {
            id: document.id.clone(),
            embedding,
            content: document.content.clone(),
            metadata: Value::Object(document.metadata.clone()).to_string(),
            fields,
        }
    }

    fn check_dimension(&self, id: &str, embedding: &[f32]) -> Result<(), VectorStoreError> {
        let expected = self.embedding_client.dimensions();
        if embedding.len() == expected {
            Ok(())
        } else {
            Err(VectorStoreError::DimensionMismatch {
                id: id.to_string(),
                expected,
                actual: embedding.len(),
            })
        }
    }

    fn observation(&self, operation: Operation) -> ObservationContext {
        ObservationContext {
            provider: self.backend.provider(),
            operation,
            collection: self.options.index_name.clone(),
            dimensions: self.embedding_client.dimensions(),
            similarity_metric: self
                .options
                .initialize_schema
                .then(|| self.backend.similarity_metric().as_str()),
        }
    }

    fn backend_error(&self, source: BackendError) -> VectorStoreError {
        VectorStoreError::Backend {
            provider: self.backend.provider(),
            source,
        }
    }
}

fn validate_threshold(threshold: f64) -> Result<(), VectorStoreError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(VectorStoreError::InvalidArgument(format!(
            "the similarity threshold must be in range [0.0:1.0], got {threshold}"
        )))
    }
}

fn to_document(hit: ScoredRecord) -> Result<Document, VectorStoreError> {
    let mut metadata = match hit.metadata.as_deref().map(str::trim) {
        Some(blob) if !blob.is_empty() => serde_json::from_str::<Map<String, Value>>(blob)
            .map_err(|source| VectorStoreError::InvalidMetadata {
                id: hit.id.clone(),
                source,
            })?,
        _ => Map::new(),
    };
    let score = hit.score.clamp(0.0, 1.0);
    metadata.insert(DISTANCE_METADATA_KEY.into(), Value::from(1.0 - score));

    Ok(Document {
        id: hit.id,
        content: hit.content.unwrap_or_default(),
        metadata,
        embedding: None,
        score: Some(score),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClientError, HashEmbeddingClient};
    use crate::filter::{Expression, FilterExpressionConverter, FilterError, FieldResolver};
    use crate::store::types::{RecordOutcome, SchemaDataType};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIMENSION: usize = 8;

    /// Backend double recording every call.
    #[derive(Default, Clone)]
    struct RecordingBackend {
        state: Arc<Mutex<Recorded>>,
    }

    #[derive(Default)]
    struct Recorded {
        calls: usize,
        schemas: Vec<IndexSchema>,
        upserts: Vec<Vec<IndexRecord>>,
        deletes: Vec<Vec<String>>,
        queries: Vec<(usize, Option<String>)>,
        upsert_outcomes: Option<Vec<RecordOutcome>>,
        delete_outcomes: Option<Vec<RecordOutcome>>,
        hits: Vec<ScoredRecord>,
    }

    impl RecordingBackend {
        fn with(configure: impl FnOnce(&mut Recorded)) -> Self {
            let backend = Self::default();
            configure(&mut *backend.state.lock().unwrap());
            backend
        }

        fn calls(&self) -> usize {
            self.state.lock().unwrap().calls
        }
    }

    struct KeyListConverter(FieldResolver);

    impl FilterExpressionConverter for KeyListConverter {
        type Output = String;

        fn convert_expression(&self, expression: &Expression) -> Result<String, FilterError> {
            match expression {
                Expression::Comparison { key, .. } => Ok(self.0.resolve(key)?.indexed_name()),
                other => Ok(other.to_string()),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for RecordingBackend {
        type Filter = String;

        fn provider(&self) -> &'static str {
            "recording"
        }

        fn filter_converter(&self, fields: &[MetadataField]) -> BoxedFilterConverter<String> {
            Box::new(KeyListConverter(FieldResolver::new(fields)))
        }

        async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.schemas.push(schema.clone());
            Ok(())
        }

        async fn upsert(
            &self,
            _index: &str,
            records: Vec<IndexRecord>,
        ) -> Result<Vec<RecordOutcome>, BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            let outcomes = state.upsert_outcomes.clone().unwrap_or_else(|| {
                records
                    .iter()
                    .map(|record| RecordOutcome::success(record.id.clone()))
                    .collect()
            });
            state.upserts.push(records);
            Ok(outcomes)
        }

        async fn delete(
            &self,
            _index: &str,
            ids: &[String],
        ) -> Result<Vec<RecordOutcome>, BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.deletes.push(ids.to_vec());
            Ok(state
                .delete_outcomes
                .clone()
                .unwrap_or_else(|| ids.iter().map(RecordOutcome::success).collect()))
        }

        async fn query(
            &self,
            _index: &str,
            query: VectorQuery<String>,
        ) -> Result<Vec<ScoredRecord>, BackendError> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.queries.push((query.top_k, query.filter));
            Ok(state.hits.clone())
        }
    }

    /// Embedding double counting calls and batch sizes.
    #[derive(Clone, Default)]
    struct CountingEmbedding {
        calls: Arc<AtomicUsize>,
        batch_sizes: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedding {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| vec![0.5; DIMENSION]).collect())
        }

        fn dimensions(&self) -> usize {
            DIMENSION
        }
    }

    async fn store_with(
        backend: RecordingBackend,
        embedding: CountingEmbedding,
    ) -> VectorStore<RecordingBackend> {
        VectorStore::builder(backend, Box::new(embedding))
            .filter_metadata_fields(vec![
                MetadataField::text("country"),
                MetadataField::int32("year"),
            ])
            .build()
            .await
            .expect("store")
    }

    #[tokio::test]
    async fn adding_nothing_never_contacts_backend() {
        let backend = RecordingBackend::default();
        let embedding = CountingEmbedding::default();
        let store = store_with(backend.clone(), embedding.clone()).await;

        store.add(Vec::new()).await.unwrap();

        assert_eq!(backend.calls(), 0);
        assert_eq!(embedding.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_ids_are_rejected_before_io() {
        let backend = RecordingBackend::default();
        let embedding = CountingEmbedding::default();
        let store = store_with(backend.clone(), embedding.clone()).await;

        let error = store
            .add(vec![Document::builder().id(" ").content("x").build()])
            .await
            .unwrap_err();

        assert!(matches!(error, VectorStoreError::InvalidArgument(_)));
        assert_eq!(backend.calls(), 0);
        assert_eq!(embedding.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn add_projects_declared_metadata_and_serializes_blob() {
        let backend = RecordingBackend::default();
        let store = store_with(backend.clone(), CountingEmbedding::default()).await;

        let document = Document::builder()
            .id("doc-1")
            .content("The World is Big")
            .meta("country", "UK")
            .meta("year", 2020)
            .meta("author", "john")
            .build();
        store.add(vec![document]).await.unwrap();

        let state = backend.state.lock().unwrap();
        let record = &state.upserts[0][0];
        assert_eq!(record.id, "doc-1");
        assert_eq!(record.content, "The World is Big");
        assert_eq!(record.embedding.len(), DIMENSION);
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.fields["meta_country"], "UK");
        assert_eq!(record.fields["meta_year"], 2020);
        let blob: Value = serde_json::from_str(&record.metadata).unwrap();
        assert_eq!(blob["author"], "john");
        assert_eq!(store.metrics_snapshot().documents_added, 1);
    }

    #[tokio::test]
    async fn existing_embeddings_are_reused() {
        let embedding = CountingEmbedding::default();
        let store = store_with(RecordingBackend::default(), embedding.clone()).await;

        store
            .add(vec![
                Document::builder()
                    .content("pre-embedded")
                    .embedding(vec![1.0; DIMENSION])
                    .build(),
                Document::new("needs embedding"),
            ])
            .await
            .unwrap();

        assert_eq!(embedding.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*embedding.batch_sizes.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn token_budget_counts_only_embedded_content() {
        let embedding = CountingEmbedding::default();
        let words: Arc<dyn Fn(&str) -> usize + Send + Sync> =
            Arc::new(|text: &str| text.split_whitespace().count());
        let store = VectorStore::builder(RecordingBackend::default(), Box::new(embedding.clone()))
            .filter_metadata_fields(vec![MetadataField::text("country")])
            .batching_strategy(TokenCountBatchingStrategy::with_counter(4, 0.0, words))
            .build()
            .await
            .expect("store");

        let verbose = "a long description that is stored but never embedded";
        store
            .add(vec![
                Document::builder()
                    .content("one two")
                    .meta("country", "UK")
                    .meta("notes", verbose)
                    .build(),
                Document::builder().content("three four").meta("notes", verbose).build(),
                Document::new("five"),
            ])
            .await
            .unwrap();

        assert_eq!(*embedding.batch_sizes.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let backend = RecordingBackend::default();
        let store = store_with(backend.clone(), CountingEmbedding::default()).await;

        let error = store
            .add(vec![
                Document::builder()
                    .id("short")
                    .content("x")
                    .embedding(vec![1.0; 3])
                    .build(),
            ])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            VectorStoreError::DimensionMismatch { ref id, expected: DIMENSION, actual: 3 } if id == "short"
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn upload_failure_names_the_failing_key() {
        let backend = RecordingBackend::with(|state| {
            state.upsert_outcomes = Some(vec![
                RecordOutcome::success("a"),
                RecordOutcome::failure("b", "quota exceeded"),
            ]);
        });
        let store = store_with(backend, CountingEmbedding::default()).await;

        let error = store
            .add(vec![
                Document::builder().id("a").content("one").build(),
                Document::builder().id("b").content("two").build(),
            ])
            .await
            .unwrap_err();

        match error {
            VectorStoreError::UploadFailed { key, message } => {
                assert_eq!(key, "b");
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(store.metrics_snapshot().documents_added, 0);
    }

    #[tokio::test]
    async fn delete_reports_aggregate_success() {
        let backend = RecordingBackend::default();
        let store = store_with(backend.clone(), CountingEmbedding::default()).await;

        assert!(store.delete(&[]).await.unwrap());
        assert_eq!(backend.calls(), 0);

        assert!(store.delete(&["missing".to_string()]).await.unwrap());

        let partial = RecordingBackend::with(|state| {
            state.delete_outcomes = Some(vec![
                RecordOutcome::success("a"),
                RecordOutcome::failure("b", "locked"),
            ]);
        });
        let store = store_with(partial, CountingEmbedding::default()).await;
        assert!(!store.delete(&["a".into(), "b".into()]).await.unwrap());
        assert_eq!(store.metrics_snapshot().documents_deleted, 1);
    }

    #[tokio::test]
    async fn search_applies_threshold_and_injects_distance() {
        let backend = RecordingBackend::with(|state| {
            state.hits = vec![
                ScoredRecord {
                    id: "near".into(),
                    content: Some("close match".into()),
                    metadata: Some(r#"{"country":"UK"}"#.into()),
                    score: 0.9,
                },
                ScoredRecord {
                    id: "far".into(),
                    content: Some("weak match".into()),
                    metadata: None,
                    score: 0.3,
                },
            ];
        });
        let store = store_with(backend.clone(), CountingEmbedding::default()).await;

        let results = store
            .similarity_search(
                SearchRequest::query("match")
                    .with_top_k(5)
                    .with_similarity_threshold(0.5)
                    .with_filter_expression(Expression::eq("country", "UK")),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.id, "near");
        assert_eq!(hit.content, "close match");
        assert_eq!(hit.metadata["country"], "UK");
        let distance = hit.metadata[DISTANCE_METADATA_KEY].as_f64().unwrap();
        assert!((distance - 0.1).abs() < 1e-9);
        assert_eq!(hit.score, Some(0.9));

        let state = backend.state.lock().unwrap();
        assert_eq!(state.queries, vec![(5, Some("meta_country".to_string()))]);
    }

    #[tokio::test]
    async fn search_rejects_undeclared_filter_keys_and_bad_thresholds() {
        let backend = RecordingBackend::default();
        let store = store_with(backend.clone(), CountingEmbedding::default()).await;

        let error = store
            .similarity_search(
                SearchRequest::query("x").with_filter_expression(Expression::eq("genre", "x")),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            VectorStoreError::Filter(FilterError::UnknownField(_))
        ));

        let error = store
            .similarity_search(SearchRequest::query("x").with_similarity_threshold(1.5))
            .await
            .unwrap_err();
        assert!(matches!(error, VectorStoreError::InvalidArgument(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn precomputed_query_embedding_skips_provider() {
        let embedding = CountingEmbedding::default();
        let store = store_with(RecordingBackend::default(), embedding.clone()).await;

        store
            .similarity_search(SearchRequest::query("x").with_query_embedding(vec![0.1; DIMENSION]))
            .await
            .unwrap();

        assert_eq!(embedding.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_query_uses_store_defaults() {
        let backend = RecordingBackend::default();
        let store = VectorStore::builder(backend.clone(), Box::new(CountingEmbedding::default()))
            .default_top_k(7)
            .build()
            .await
            .unwrap();

        store.similarity_search_query("hello").await.unwrap();
        assert_eq!(backend.state.lock().unwrap().queries[0].0, 7);
    }

    #[tokio::test]
    async fn schema_bootstrap_only_runs_when_enabled() {
        let backend = RecordingBackend::default();
        let _ = VectorStore::builder(backend.clone(), Box::new(HashEmbeddingClient::new(16)))
            .build()
            .await
            .unwrap();
        assert!(backend.state.lock().unwrap().schemas.is_empty());

        let backend = RecordingBackend::default();
        let _ = VectorStore::builder(backend.clone(), Box::new(HashEmbeddingClient::new(16)))
            .index_name("docs")
            .filter_metadata_fields(vec![MetadataField::text("country")])
            .initialize_schema(true)
            .build()
            .await
            .unwrap();

        let state = backend.state.lock().unwrap();
        assert_eq!(state.schemas.len(), 1);
        let schema = &state.schemas[0];
        assert_eq!(schema.name, "docs");
        let vector_fields = schema
            .fields
            .iter()
            .filter(|field| matches!(field.data_type, SchemaDataType::Vector { dimensions: 16 }))
            .count();
        assert_eq!(vector_fields, 1);
        assert_eq!(schema.metadata_fields().count(), 1);
    }

    #[tokio::test]
    async fn builder_validates_options() {
        let blank = VectorStore::builder(
            RecordingBackend::default(),
            Box::new(HashEmbeddingClient::new(4)),
        )
        .index_name("  ")
        .build()
        .await;
        assert!(matches!(blank, Err(VectorStoreError::InvalidArgument(_))));

        let threshold = VectorStore::builder(
            RecordingBackend::default(),
            Box::new(HashEmbeddingClient::new(4)),
        )
        .default_similarity_threshold(-0.1)
        .build()
        .await;
        assert!(matches!(threshold, Err(VectorStoreError::InvalidArgument(_))));

        let top_k = VectorStore::builder(
            RecordingBackend::default(),
            Box::new(HashEmbeddingClient::new(4)),
        )
        .default_top_k(0)
        .build()
        .await;
        assert!(matches!(top_k, Err(VectorStoreError::InvalidArgument(_))));
    }
}
