use std::{env, sync::Once};

use rustyvec::{
    Document, SearchRequest, VectorStore,
    azure::AzureSearchClient,
    config, embedding,
    qdrant::QdrantService,
    store::MetadataField,
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("VECTOR_STORE_BACKEND", "qdrant");
        set_default_env("VECTOR_STORE_INDEX_NAME", "rustyvec_live");
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config().expect("live configuration");
    });
    config::get_config()
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = init_config_once();
    let client = embedding::get_embedding_client(config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["rustyvec live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Qdrant and Ollama"]
async fn live_qdrant_add_search_delete() {
    let config = init_config_once();
    let backend = QdrantService::from_config(config).expect("qdrant client");
    let store = VectorStore::builder(
        backend,
        embedding::get_embedding_client(config).expect("embedding client"),
    )
    .index_name(&config.index_name)
    .filter_metadata_fields(vec![MetadataField::text("country")])
    .initialize_schema(true)
    .build()
    .await
    .expect("store");

    let document = Document::builder()
        .id("live-1")
        .content("The World is Big and Salvation Lurks Around the Corner")
        .meta("country", "UK")
        .build();
    store.add(vec![document]).await.expect("add");

    let hits = store
        .similarity_search(
            SearchRequest::query("The World")
                .with_top_k(1)
                .with_filter_text("country == 'UK'")
                .expect("filter"),
        )
        .await
        .expect("search");
    assert_eq!(hits.first().map(|hit| hit.id.as_str()), Some("live-1"));

    assert!(store.delete(&["live-1".to_string()]).await.expect("delete"));
}

#[tokio::test]
#[ignore = "Requires a live Azure AI Search service"]
async fn live_azure_schema_bootstrap() {
    let (Ok(endpoint), Ok(key)) = (
        env::var("AZURE_SEARCH_ENDPOINT"),
        env::var("AZURE_SEARCH_API_KEY"),
    ) else {
        panic!("AZURE_SEARCH_ENDPOINT and AZURE_SEARCH_API_KEY must be set");
    };
    let backend = AzureSearchClient::new(&endpoint, Some(key), None).expect("azure client");
    let store = VectorStore::builder(backend, Box::new(embedding::HashEmbeddingClient::new(384)))
        .index_name("rustyvec-live")
        .filter_metadata_fields(vec![MetadataField::text("country"), MetadataField::int32("year")])
        .initialize_schema(true)
        .build()
        .await
        .expect("schema bootstrap");

    store
        .add(vec![Document::builder().id("live-azure").content("hello").build()])
        .await
        .expect("add");
    assert!(store.delete(&["live-azure".to_string()]).await.expect("delete"));
}
