use crate::store::{FieldType, MetadataField};
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_INDEX_NAME: &str = "rusty_vector_store";
const DEFAULT_TOP_K: usize = 4;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.0;
const DEFAULT_AZURE_API_VERSION: &str = "2024-07-01";
const DEFAULT_MAX_INPUT_TOKENS: usize = 8191;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the vector store server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend the store is bound to.
    pub backend: BackendKind,
    /// Name of the index (Azure) or collection (Qdrant, memory).
    pub index_name: String,
    /// Whether the index schema is created on startup.
    pub initialize_schema: bool,
    /// Result count used when a request does not specify one.
    pub default_top_k: usize,
    /// Threshold used when a request does not specify one.
    pub default_similarity_threshold: f64,
    /// Metadata keys projected into filterable top-level fields.
    pub filter_metadata_fields: Vec<MetadataField>,
    /// Azure AI Search service endpoint.
    pub azure_search_endpoint: Option<String>,
    /// Azure AI Search admin or query key.
    pub azure_search_api_key: Option<String>,
    /// REST API version sent with every Azure request.
    pub azure_search_api_version: String,
    /// Base URL of the Qdrant instance.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Token budget of a single embedding request.
    pub embedding_max_input_tokens: usize,
    /// Base URL of the Ollama runtime.
    pub ollama_url: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported search backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Azure AI Search REST API.
    Azure,
    /// Qdrant REST API.
    Qdrant,
    /// Process-local brute-force index.
    Memory,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic offline feature hashing.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = load_env("VECTOR_STORE_BACKEND")?
            .parse()
            .map_err(|()| ConfigError::InvalidValue("VECTOR_STORE_BACKEND".into()))?;

        let config = Self {
            backend,
            index_name: load_env_optional("VECTOR_STORE_INDEX_NAME")
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            initialize_schema: parse_optional("VECTOR_STORE_INITIALIZE_SCHEMA", parse_bool)?
                .unwrap_or(false),
            default_top_k: parse_optional("VECTOR_STORE_DEFAULT_TOP_K", parse_top_k)?
                .unwrap_or(DEFAULT_TOP_K),
            default_similarity_threshold: parse_optional(
                "VECTOR_STORE_DEFAULT_SIMILARITY_THRESHOLD",
                |value| {
                    value
                        .parse::<f64>()
                        .ok()
                        .filter(|threshold| (0.0..=1.0).contains(threshold))
                },
            )?
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            filter_metadata_fields: load_env_optional("VECTOR_STORE_FILTER_FIELDS")
                .map(|value| parse_filter_fields(&value))
                .transpose()?
                .unwrap_or_default(),
            azure_search_endpoint: load_env_optional("AZURE_SEARCH_ENDPOINT"),
            azure_search_api_key: load_env_optional("AZURE_SEARCH_API_KEY"),
            azure_search_api_version: load_env_optional("AZURE_SEARCH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .ok()
                .filter(|dimension| *dimension > 0)
                .ok_or_else(|| ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()))?,
            embedding_max_input_tokens: parse_optional("EMBEDDING_MAX_INPUT_TOKENS", |value| {
                value.parse().ok().filter(|tokens| *tokens > 0)
            })?
            .unwrap_or(DEFAULT_MAX_INPUT_TOKENS),
            ollama_url: load_env_optional("OLLAMA_URL"),
            server_port: parse_optional("SERVER_PORT", |value| value.parse().ok())?,
        };

        match config.backend {
            BackendKind::Azure if config.azure_search_endpoint.is_none() => Err(
                ConfigError::MissingVariable("AZURE_SEARCH_ENDPOINT".into()),
            ),
            BackendKind::Qdrant if config.qdrant_url.is_none() => {
                Err(ConfigError::MissingVariable("QDRANT_URL".into()))
            }
            _ => Ok(config),
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T>(
    key: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| parse(value.trim()).ok_or_else(|| ConfigError::InvalidValue(key.into())))
        .transpose()
}

fn parse_top_k(value: &str) -> Option<usize> {
    value.parse().ok().filter(|top_k| *top_k > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `name:type` pairs separated by commas, e.g. `country:text,year:int32`.
pub fn parse_filter_fields(value: &str) -> Result<Vec<MetadataField>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, kind) = entry.split_once(':').unwrap_or((entry, "text"));
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue("VECTOR_STORE_FILTER_FIELDS".into()));
            }
            let field_type: FieldType = kind.trim().parse().map_err(|()| {
                ConfigError::InvalidValue(format!("VECTOR_STORE_FILTER_FIELDS ({entry})"))
            })?;
            Ok(MetadataField::new(name, field_type))
        })
        .collect()
}

impl std::str::FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        backend = ?config.backend,
        index = %config.index_name,
        initialize_schema = config.initialize_schema,
        filter_fields = config.filter_metadata_fields.len(),
        embedding_provider = ?config.embedding_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_fields_parse_names_and_types() {
        let fields = parse_filter_fields("country:text, year:int32 ,active:bool,,rating").unwrap();
        assert_eq!(
            fields,
            vec![
                MetadataField::text("country"),
                MetadataField::int32("year"),
                MetadataField::boolean("active"),
                MetadataField::text("rating"),
            ]
        );
    }

    #[test]
    fn filter_fields_reject_unknown_type() {
        let error = parse_filter_fields("year:float128").unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue(message) if message.contains("year")));
    }

    #[test]
    fn top_k_must_be_positive() {
        assert_eq!(parse_top_k("8"), Some(8));
        assert_eq!(parse_top_k("0"), None);
        assert_eq!(parse_top_k("-1"), None);
    }

    #[test]
    fn bool_values_accept_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("Azure".parse::<BackendKind>(), Ok(BackendKind::Azure));
        assert_eq!("memory".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert!("pinecone".parse::<BackendKind>().is_err());
    }
}
