//! Azure AI Search integration over the REST API.

pub mod client;
pub mod filters;
pub mod types;

pub use client::{AzureSearchClient, VECTOR_ALGORITHM_NAME, VECTOR_PROFILE_NAME};
pub use filters::ODataFilterConverter;
pub use types::AzureSearchError;
