use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use rustyvec::{
    Document, SearchRequest, VectorStore, VectorStoreError,
    api::create_router,
    embedding::HashEmbeddingClient,
    filter::FilterError,
    memory::InMemoryBackend,
    store::MetadataField,
};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn store() -> VectorStore<InMemoryBackend> {
    VectorStore::builder(InMemoryBackend::new(), Box::new(HashEmbeddingClient::new(128)))
        .index_name("docs")
        .filter_metadata_fields(vec![
            MetadataField::text("country"),
            MetadataField::int32("year"),
        ])
        .initialize_schema(true)
        .build()
        .await
        .expect("store")
}

fn corpus() -> Vec<Document> {
    vec![
        Document::builder()
            .id("1")
            .content("The World is Big and Salvation Lurks Around the Corner")
            .meta("country", "UK")
            .meta("year", 2020)
            .build(),
        Document::builder()
            .id("2")
            .content("The World is Big and Salvation Lurks Around the Corner")
            .meta("country", "NL")
            .build(),
        Document::builder()
            .id("3")
            .content("The World is Big and Salvation Lurks Around the Corner")
            .meta("country", "BG")
            .meta("year", 2023)
            .build(),
    ]
}

#[tokio::test]
async fn add_then_search_returns_stored_document() {
    let store = store().await;
    let document = Document::builder()
        .id("rocks")
        .content("Rust vectors rock!!")
        .meta("country", "UK")
        .meta("author", "john")
        .build();
    store.add(vec![document]).await.expect("add");

    let hits = store
        .similarity_search(SearchRequest::query("Rust").with_similarity_threshold_all())
        .await
        .expect("search");

    assert_eq!(hits.len(), 1);
    let hit = &hits[0];
    assert_eq!(hit.id, "rocks");
    assert_eq!(hit.content, "Rust vectors rock!!");
    assert_eq!(hit.metadata["author"], "john");
    assert_eq!(hit.metadata["country"], "UK");
    let score = hit.score.expect("score");
    let distance = hit.metadata["distance"].as_f64().expect("distance");
    assert!((score + distance - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn filters_restrict_results() {
    let store = store().await;
    store.add(corpus()).await.expect("add");

    let ids = |hits: Vec<Document>| {
        let mut ids: Vec<String> = hits.into_iter().map(|hit| hit.id).collect();
        ids.sort();
        ids
    };

    let request = SearchRequest::query("The World").with_top_k(5);
    let hits = store
        .similarity_search(request.clone().with_filter_text("country == 'NL'").unwrap())
        .await
        .unwrap();
    assert_eq!(ids(hits), vec!["2"]);

    let hits = store
        .similarity_search(
            request
                .clone()
                .with_filter_text("country in ['UK', 'NL'] && not (year >= 2021)")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ids(hits), vec!["1", "2"]);

    let hits = store
        .similarity_search(
            request
                .clone()
                .with_filter_text("country == 'BG' || year == 2020")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ids(hits), vec!["1", "3"]);

    let error = store
        .similarity_search(request.with_filter_text("author == 'john'").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        VectorStoreError::Filter(FilterError::UnknownField(ref name)) if name == "meta_author"
    ));
}

#[tokio::test]
async fn threshold_excludes_weak_hits_and_delete_removes_documents() {
    let store = store().await;
    store
        .add(vec![
            Document::builder().id("close").content("rust vector store").build(),
            Document::builder().id("far").content("banana bread recipe").build(),
        ])
        .await
        .unwrap();

    let hits = store
        .similarity_search(
            SearchRequest::query("rust vector store")
                .with_top_k(5)
                .with_similarity_threshold(0.99),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "close");

    assert!(store.delete(&["close".to_string(), "ghost".to_string()]).await.unwrap());
    let hits = store
        .similarity_search(SearchRequest::query("rust vector store").with_top_k(5))
        .await
        .unwrap();
    assert_eq!(hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>(), vec!["far"]);
}

#[tokio::test]
async fn http_surface_round_trips_documents() {
    let app = create_router(Arc::new(store().await));

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/documents",
        json!({ "documents": [{ "id": "doc-1", "content": "hello rust", "metadata": { "country": "UK" } }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], 1);

    let (status, body) = send(
        app.clone(),
        Method::POST,
        "/search",
        json!({ "query": "hello rust", "filter": "country == 'UK'" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"][0]["id"], "doc-1");
    assert_eq!(body["documents"][0]["metadata"]["country"], "UK");

    let (status, _) = send(
        app.clone(),
        Method::POST,
        "/search",
        json!({ "query": "hello", "similarity_threshold": 2.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app.clone(),
        Method::POST,
        "/documents",
        json!({ "documents": [{ "id": "", "content": "no id" }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app, Method::DELETE, "/documents", json!({ "ids": ["doc-1"] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

async fn send(app: axum::Router, method: Method, uri: &str, payload: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("router response");

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
