//! Error and wire types for the Azure AI Search REST API.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with Azure AI Search.
#[derive(Debug, Error)]
pub enum AzureSearchError {
    /// Service endpoint failed to parse or normalize.
    #[error("Invalid Azure AI Search endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with an unexpected status code.
    #[error("Unexpected Azure AI Search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexDefinition {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) vector_search: VectorSearchDefinition,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FieldDefinition {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) data_type: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) key: bool,
    pub(crate) filterable: bool,
    pub(crate) sortable: bool,
    pub(crate) searchable: bool,
    pub(crate) facetable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) vector_search_profile: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct VectorSearchDefinition {
    pub(crate) algorithms: Vec<AlgorithmDefinition>,
    pub(crate) profiles: Vec<ProfileDefinition>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlgorithmDefinition {
    pub(crate) name: String,
    pub(crate) kind: &'static str,
    pub(crate) hnsw_parameters: HnswDefinition,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HnswDefinition {
    pub(crate) m: u32,
    pub(crate) ef_construction: u32,
    pub(crate) ef_search: u32,
    pub(crate) metric: &'static str,
}

#[derive(Serialize)]
pub(crate) struct ProfileDefinition {
    pub(crate) name: String,
    pub(crate) algorithm: String,
}

#[derive(Deserialize)]
pub(crate) struct IndexBatchResponse {
    #[serde(default)]
    pub(crate) value: Vec<IndexingResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexingResult {
    pub(crate) key: String,
    pub(crate) status: bool,
    #[serde(default)]
    pub(crate) error_message: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) value: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub(crate) struct SearchHit {
    #[serde(rename = "@search.score")]
    pub(crate) score: f64,
    #[serde(flatten)]
    pub(crate) fields: Map<String, Value>,
}
