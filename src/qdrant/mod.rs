//! Qdrant vector store integration.

pub mod client;
pub mod filters;
mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::QdrantFilterConverter;
pub use types::{QdrantError, ScoredPoint};
