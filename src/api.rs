//! HTTP surface for the vector store.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /documents` – Embed and upsert documents. Returns `{ "added": n }`.
//! - `DELETE /documents` – Delete documents by id. Returns `{ "success": bool }`, `true` only when
//!   the backend confirmed every deletion.
//! - `POST /search` – Similarity search with optional `top_k`, `similarity_threshold`, and a
//!   `filter` in text form (`country == 'UK' && year >= 2020`).
//! - `GET /metrics` – Observe store counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Invalid input maps to `400 Bad Request`; every other failure maps to `500`.

use crate::document::Document;
use crate::filter;
use crate::store::{MetricsSnapshot, SearchBackend, SearchRequest, VectorStore, VectorStoreError};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Operations the HTTP layer needs from a store.
#[async_trait]
pub trait VectorStoreApi: Send + Sync {
    /// Embed and upsert documents, returning how many were accepted.
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, VectorStoreError>;

    /// Delete documents by id.
    async fn delete_documents(&self, ids: &[String]) -> Result<bool, VectorStoreError>;

    /// Run a similarity search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Document>, VectorStoreError>;

    /// Search request for `query` carrying the store's default result count and threshold.
    fn default_search(&self, query: String) -> SearchRequest;

    /// Return the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

#[async_trait]
impl<B> VectorStoreApi for VectorStore<B>
where
    B: SearchBackend + 'static,
{
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, VectorStoreError> {
        let count = documents.len();
        self.add(documents).await?;
        Ok(count)
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<bool, VectorStoreError> {
        self.delete(ids).await
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Document>, VectorStoreError> {
        self.similarity_search(request).await
    }

    fn default_search(&self, query: String) -> SearchRequest {
        let options = self.options();
        SearchRequest::query(query)
            .with_top_k(options.default_top_k)
            .with_similarity_threshold(options.default_similarity_threshold)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        VectorStore::metrics_snapshot(self)
    }
}

/// Build the HTTP router exposing the store API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: VectorStoreApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            post(add_documents::<S>).delete(delete_documents::<S>),
        )
        .route("/search", post(search::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Document as accepted by `POST /documents`.
#[derive(Deserialize)]
struct DocumentInput {
    /// Optional identifier; a UUID is generated when absent.
    #[serde(default)]
    id: Option<String>,
    /// Raw text to embed.
    content: String,
    /// Arbitrary metadata.
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<DocumentInput> for Document {
    fn from(input: DocumentInput) -> Self {
        let builder = Document::builder()
            .content(input.content)
            .metadata(input.metadata);
        match input.id {
            Some(id) => builder.id(id).build(),
            None => builder.build(),
        }
    }
}

/// Request body for `POST /documents`.
#[derive(Deserialize)]
struct AddRequest {
    documents: Vec<DocumentInput>,
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct AddResponse {
    added: usize,
}

async fn add_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AddRequest>,
) -> Result<Json<AddResponse>, AppError>
where
    S: VectorStoreApi,
{
    let documents: Vec<Document> = request.documents.into_iter().map(Document::from).collect();
    let added = service.add_documents(documents).await?;
    tracing::info!(added, "Add request completed");
    Ok(Json(AddResponse { added }))
}

/// Request body for `DELETE /documents`.
#[derive(Deserialize)]
struct DeleteRequest {
    ids: Vec<String>,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

async fn delete_documents<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, AppError>
where
    S: VectorStoreApi,
{
    let success = service.delete_documents(&request.ids).await?;
    tracing::info!(requested = request.ids.len(), success, "Delete request completed");
    Ok(Json(DeleteResponse { success }))
}

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    similarity_threshold: Option<f64>,
    /// Filter in text form.
    #[serde(default)]
    filter: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    documents: Vec<Document>,
}

async fn search<S>(
    State(service): State<Arc<S>>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError>
where
    S: VectorStoreApi,
{
    let mut request = service.default_search(body.query);
    if let Some(top_k) = body.top_k {
        request = request.with_top_k(top_k);
    }
    if let Some(threshold) = body.similarity_threshold {
        request = request.with_similarity_threshold(threshold);
    }
    if let Some(text) = body.filter.as_deref().filter(|text| !text.trim().is_empty()) {
        request = request.with_filter_expression(filter::parse(text).map_err(VectorStoreError::from)?);
    }

    let documents = service.search(request).await?;
    tracing::debug!(hits = documents.len(), "Search request completed");
    Ok(Json(SearchResponse { documents }))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: VectorStoreApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "add_documents",
                method: "POST",
                path: "/documents",
                description: "Embed documents and upsert them into the index. Response returns { \"added\": number }.",
                request_example: Some(json!({
                    "documents": [{
                        "id": "optional-id",
                        "content": "The World is Big and Salvation Lurks Around the Corner",
                        "metadata": { "country": "UK", "year": 2020 }
                    }]
                })),
            },
            CommandDescriptor {
                name: "delete_documents",
                method: "DELETE",
                path: "/documents",
                description: "Delete documents by id. Response returns { \"success\": bool }.",
                request_example: Some(json!({ "ids": ["optional-id"] })),
            },
            CommandDescriptor {
                name: "search",
                method: "POST",
                path: "/search",
                description: "Similarity search with optional top_k, similarity_threshold, and metadata filter.",
                request_example: Some(json!({
                    "query": "The World",
                    "top_k": 4,
                    "similarity_threshold": 0.0,
                    "filter": "country == 'UK' && year >= 2020"
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return store counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

struct AppError(VectorStoreError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VectorStoreError::InvalidArgument(_)
            | VectorStoreError::Filter(_)
            | VectorStoreError::Batching(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}

impl From<VectorStoreError> for AppError {
    fn from(inner: VectorStoreError) -> Self {
        Self(inner)
    }
}
