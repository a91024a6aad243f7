//! HTTP client wrapper for the Azure AI Search REST API.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value, json};

use super::filters::ODataFilterConverter;
use super::types::{
    AlgorithmDefinition, AzureSearchError, FieldDefinition, HnswDefinition, IndexBatchResponse,
    IndexDefinition, ProfileDefinition, SearchResponse, VectorSearchDefinition,
};
use crate::config::Config;
use crate::http::{USER_AGENT, format_endpoint, normalize_base_url};
use crate::store::types::{
    CONTENT_FIELD_NAME, EMBEDDING_FIELD_NAME, ID_FIELD_NAME, METADATA_FIELD_NAME,
};
use crate::store::{
    BackendError, BoxedFilterConverter, FieldType, IndexRecord, IndexSchema, MetadataField,
    RecordOutcome, SchemaDataType, SchemaField, ScoredRecord, SearchBackend, VectorQuery,
};

/// Name of the vector search profile attached to the embedding field.
pub const VECTOR_PROFILE_NAME: &str = "rusty-vector-profile";
/// Name of the HNSW algorithm configuration referenced by the profile.
pub const VECTOR_ALGORITHM_NAME: &str = "rusty-vector-config";

const DEFAULT_API_VERSION: &str = "2024-07-01";

/// Lightweight HTTP client for Azure AI Search operations.
pub struct AzureSearchClient {
    pub(crate) client: Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: Option<String>,
    pub(crate) api_version: String,
}

impl AzureSearchClient {
    /// Construct a client for the service at `endpoint`.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        api_version: Option<String>,
    ) -> Result<Self, AzureSearchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        let endpoint = normalize_base_url(endpoint).map_err(AzureSearchError::InvalidUrl)?;
        let api_version = api_version
            .filter(|version| !version.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        tracing::debug!(
            endpoint = %endpoint,
            api_version = %api_version,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Azure AI Search HTTP client"
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            api_version,
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, AzureSearchError> {
        let endpoint = config.azure_search_endpoint.as_deref().ok_or_else(|| {
            AzureSearchError::InvalidUrl("AZURE_SEARCH_ENDPOINT is not set".into())
        })?;
        Self::new(
            endpoint,
            config.azure_search_api_key.clone(),
            Some(config.azure_search_api_version.clone()),
        )
    }

    /// Create or update an index definition.
    pub async fn create_or_update_index(&self, schema: &IndexSchema) -> Result<(), AzureSearchError> {
        let definition = index_definition(schema);
        let response = self
            .request(Method::PUT, &format!("indexes/{}", schema.name))
            .json(&definition)
            .send()
            .await?;

        ensure_success(response, |status| {
            tracing::debug!(index = %schema.name, %status, "Index created or updated");
        })
        .await
    }

    /// Submit a batch of index actions and return the per-document results.
    pub async fn index_documents(
        &self,
        index: &str,
        actions: Vec<Value>,
    ) -> Result<Vec<RecordOutcome>, AzureSearchError> {
        let count = actions.len();
        let response = self
            .request(Method::POST, &format!("indexes/{index}/docs/index"))
            .json(&json!({ "value": actions }))
            .send()
            .await?;

        // 207 carries per-document failures in the body.
        let status = response.status();
        if !(status == StatusCode::OK || status == StatusCode::MULTI_STATUS) {
            let body = response.text().await.unwrap_or_default();
            let error = AzureSearchError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Index batch failed");
            return Err(error);
        }

        let payload: IndexBatchResponse = response.json().await?;
        tracing::debug!(index, actions = count, %status, "Index batch applied");
        Ok(payload
            .value
            .into_iter()
            .map(|result| {
                if result.status {
                    RecordOutcome::success(result.key)
                } else {
                    RecordOutcome::failure(
                        result.key,
                        result
                            .error_message
                            .unwrap_or_else(|| "no error message returned".into()),
                    )
                }
            })
            .collect())
    }

    /// Run a vector query, optionally constrained by an OData filter.
    pub async fn search(
        &self,
        index: &str,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<String>,
    ) -> Result<Vec<ScoredRecord>, AzureSearchError> {
        let mut body = json!({
            "top": top_k,
            "select": format!("{ID_FIELD_NAME},{CONTENT_FIELD_NAME},{METADATA_FIELD_NAME}"),
            "vectorQueries": [{
                "kind": "vector",
                "vector": vector,
                "k": top_k,
                "fields": EMBEDDING_FIELD_NAME,
            }],
        });
        if let (Some(filter), Some(object)) = (filter, body.as_object_mut())
            && !filter.trim().is_empty()
        {
            object.insert("filter".into(), Value::String(filter));
        }

        let response = self
            .request(Method::POST, &format!("indexes/{index}/docs/search"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = AzureSearchError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Azure AI Search query failed");
            return Err(error);
        }

        let payload: SearchResponse = response.json().await?;
        Ok(payload
            .value
            .into_iter()
            .filter_map(|hit| {
                let mut fields = hit.fields;
                let Some(id) = take_string(&mut fields, ID_FIELD_NAME).filter(|id| !id.is_empty())
                else {
                    tracing::warn!(index, score = hit.score, "Skipping search hit without a key");
                    return None;
                };
                Some(ScoredRecord {
                    id,
                    content: take_string(&mut fields, CONTENT_FIELD_NAME),
                    metadata: take_string(&mut fields, METADATA_FIELD_NAME),
                    score: hit.score,
                })
            })
            .collect())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.endpoint, path);
        let mut req = self
            .client
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())]);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

#[async_trait]
impl SearchBackend for AzureSearchClient {
    type Filter = String;

    fn provider(&self) -> &'static str {
        "azure"
    }

    fn filter_converter(&self, fields: &[MetadataField]) -> BoxedFilterConverter<String> {
        Box::new(ODataFilterConverter::new(fields))
    }

    async fn ensure_index(&self, schema: &IndexSchema) -> Result<(), BackendError> {
        Ok(self.create_or_update_index(schema).await?)
    }

    async fn upsert(
        &self,
        index: &str,
        records: Vec<IndexRecord>,
    ) -> Result<Vec<RecordOutcome>, BackendError> {
        let actions = records.into_iter().map(upload_action).collect();
        Ok(self.index_documents(index, actions).await?)
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<Vec<RecordOutcome>, BackendError> {
        let actions = ids
            .iter()
            .map(|id| json!({ "@search.action": "delete", ID_FIELD_NAME: id }))
            .collect();
        Ok(self.index_documents(index, actions).await?)
    }

    async fn query(
        &self,
        index: &str,
        query: VectorQuery<String>,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        Ok(self
            .search(index, query.embedding, query.top_k, query.filter)
            .await?)
    }
}

fn upload_action(record: IndexRecord) -> Value {
    let mut document = Map::new();
    document.insert("@search.action".into(), Value::from("upload"));
    document.insert(ID_FIELD_NAME.into(), Value::String(record.id));
    document.insert(EMBEDDING_FIELD_NAME.into(), Value::from(record.embedding));
    document.insert(CONTENT_FIELD_NAME.into(), Value::String(record.content));
    document.insert(METADATA_FIELD_NAME.into(), Value::String(record.metadata));
    document.extend(record.fields);
    Value::Object(document)
}

fn index_definition(schema: &IndexSchema) -> IndexDefinition {
    IndexDefinition {
        name: schema.name.clone(),
        fields: schema.fields.iter().map(field_definition).collect(),
        vector_search: VectorSearchDefinition {
            algorithms: vec![AlgorithmDefinition {
                name: VECTOR_ALGORITHM_NAME.into(),
                kind: "hnsw",
                hnsw_parameters: HnswDefinition {
                    m: schema.hnsw.m,
                    ef_construction: schema.hnsw.ef_construction,
                    ef_search: schema.hnsw.ef_search,
                    metric: schema.metric.as_str(),
                },
            }],
            profiles: vec![ProfileDefinition {
                name: VECTOR_PROFILE_NAME.into(),
                algorithm: VECTOR_ALGORITHM_NAME.into(),
            }],
        },
    }
}

fn field_definition(field: &SchemaField) -> FieldDefinition {
    let base = FieldDefinition {
        name: field.name.clone(),
        key: field.key,
        filterable: field.filterable,
        sortable: field.sortable,
        searchable: field.searchable,
        facetable: field.facetable,
        ..FieldDefinition::default()
    };
    match field.data_type {
        SchemaDataType::Vector { dimensions } => FieldDefinition {
            data_type: "Collection(Edm.Single)",
            dimensions: Some(dimensions),
            vector_search_profile: Some(VECTOR_PROFILE_NAME.into()),
            ..base
        },
        SchemaDataType::Scalar(field_type) => FieldDefinition {
            data_type: edm_type(field_type),
            ..base
        },
    }
}

fn edm_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "Edm.String",
        FieldType::Int32 => "Edm.Int32",
        FieldType::Int64 => "Edm.Int64",
        FieldType::Double => "Edm.Double",
        FieldType::Boolean => "Edm.Boolean",
        FieldType::DateTime => "Edm.DateTimeOffset",
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

async fn ensure_success<F>(response: reqwest::Response, on_success: F) -> Result<(), AzureSearchError>
where
    F: FnOnce(StatusCode),
{
    let status = response.status();
    if status.is_success() {
        on_success(status);
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        let error = AzureSearchError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "Azure AI Search request failed");
        Err(error)
    }
}
