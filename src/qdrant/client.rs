//! HTTP client wrapper for interacting with Qdrant.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

use crate::config::Config;
use crate::http::{USER_AGENT, format_endpoint, normalize_base_url};
use crate::qdrant::{
    filters::QdrantFilterConverter,
    payload::{build_point, point_id, scored_record},
    types::{QdrantError, QueryResponse, QueryResponseResult, ScoredPoint},
};
use crate::store::{
    BackendError, BoxedFilterConverter, FieldType, HnswParameters, IndexRecord, IndexSchema,
    MetadataField, RecordOutcome, ScoredRecord, SearchBackend, VectorQuery,
};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) hnsw_ef: u32,
}

impl QdrantService {
    /// Construct a client for the instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            hnsw_ef: HnswParameters::default().ef_search,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, QdrantError> {
        let url = config
            .qdrant_url
            .as_deref()
            .ok_or_else(|| QdrantError::InvalidUrl("QDRANT_URL is not set".into()))?;
        Self::new(url, config.qdrant_api_key.clone())
    }

    /// Create a collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(
        &self,
        collection_name: &str,
        vector_size: u64,
        hnsw: HnswParameters,
    ) -> Result<(), QdrantError> {
        if self.collection_exists(collection_name).await? {
            tracing::debug!(collection = collection_name, "Collection already exists");
            return Ok(());
        }

        tracing::debug!(
            collection = collection_name,
            vector_size,
            "Creating collection"
        );
        self.create_collection(collection_name, vector_size, hnsw)
            .await
    }

    /// Create a collection with the specified vector size and HNSW parameters.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        hnsw: HnswParameters,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            },
            "hnsw_config": {
                "m": hnsw.m,
                "ef_construct": hnsw.ef_construction
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    /// Ensure a payload index exists for each projected metadata field.
    pub async fn ensure_payload_indexes<'a>(
        &self,
        collection_name: &str,
        fields: impl IntoIterator<Item = (&'a str, FieldType)>,
    ) -> Result<(), QdrantError> {
        for (field, field_type) in fields {
            let schema = payload_schema(field_type);
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .query(&[("wait", true)])
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    schema,
                    "Payload index ensured"
                );
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(
                    collection = collection_name,
                    field,
                    schema,
                    "Payload index already exists"
                );
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, field, schema, error = %error, "Failed to ensure payload index");
                return Err(error);
            }
        }

        Ok(())
    }

    /// Upsert points, waiting for the operation to be applied.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: Vec<Value>,
    ) -> Result<(), QdrantError> {
        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await
    }

    /// Delete points by id, waiting for the operation to be applied.
    pub async fn delete_points(
        &self,
        collection_name: &str,
        point_ids: Vec<String>,
    ) -> Result<(), QdrantError> {
        let point_count = point_ids.len();
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": point_ids }))
            .send()
            .await?;

        ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points deleted"
            );
        })
        .await
    }

    /// Perform a similarity search against a collection, returning scored payloads.
    pub async fn search_points(
        &self,
        collection_name: &str,
        vector: Vec<f32>,
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "params": { "hnsw_ef": self.hnsw_ef },
        });

        if let (Some(filter_value), Some(object)) = (filter, body.as_object_mut()) {
            object.insert("filter".into(), filter_value);
        }

        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/query"),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        let results = points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect();

        Ok(results)
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl SearchBackend for QdrantService {
    type Filter = Value;

    fn provider(&self) -> &'static str {
        "qdrant"
    }

    fn filter_converter(&self, fields: &[MetadataField]) -> BoxedFilterConverter<Value> {
        Box::new(QdrantFilterConverter::new(fields))
    }

    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), BackendError> {
        let dimensions = schema.dimensions().unwrap_or_default() as u64;
        self.create_collection_if_not_exists(&schema.name, dimensions, schema.hnsw)
            .await?;
        self.ensure_payload_indexes(&schema.name, schema.metadata_fields())
            .await?;
        Ok(())
    }

    async fn upsert(
        &self,
        index: &str,
        records: Vec<IndexRecord>,
    ) -> Result<Vec<RecordOutcome>, BackendError> {
        let keys: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
        let points = records.into_iter().map(build_point).collect();
        self.upsert_points(index, points).await?;
        // Upserts are applied atomically per request.
        Ok(keys.into_iter().map(RecordOutcome::success).collect())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<RecordOutcome>, BackendError> {
        let point_ids = ids.iter().map(|id| point_id(id)).collect();
        self.delete_points(index, point_ids).await?;
        Ok(ids.iter().map(RecordOutcome::success).collect())
    }

    async fn query(
        &self,
        index: &str,
        query: VectorQuery<Value>,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        let points = self
            .search_points(index, query.embedding, query.filter, query.top_k)
            .await?;
        Ok(points
            .into_iter()
            .map(|point| scored_record(point.id, point.score, point.payload))
            .collect())
    }
}

fn payload_schema(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "keyword",
        FieldType::Int32 | FieldType::Int64 => "integer",
        FieldType::Double => "float",
        FieldType::Boolean => "bool",
        FieldType::DateTime => "datetime",
    }
}

async fn ensure_success<F>(response: reqwest::Response, on_success: F) -> Result<(), QdrantError>
where
    F: FnOnce(),
{
    if response.status().is_success() {
        on_success();
        Ok(())
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = QdrantError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "Qdrant request failed");
        Err(error)
    }
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
