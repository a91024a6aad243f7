#![deny(missing_docs)]

//! Vector store adapter binding documents, embeddings, and metadata filters onto Azure AI
//! Search, Qdrant, or an in-process index.

/// HTTP routing and REST handlers.
pub mod api;
/// Azure AI Search backend.
pub mod azure;
/// Environment-driven configuration management.
pub mod config;
/// Document model.
pub mod document;
/// Embedding client abstraction, adapters, and batching.
pub mod embedding;
/// Portable filter expressions and their backend translations.
pub mod filter;
mod http;
/// Structured logging and tracing setup.
pub mod logging;
/// In-memory backend.
pub mod memory;
/// Qdrant backend.
pub mod qdrant;
/// Vector store service, backend seam, and observation.
pub mod store;

pub use document::Document;
pub use store::{SearchRequest, VectorStore, VectorStoreError};
