use httpmock::{Method::PUT, MockServer, prelude::HttpMockRequest};
use rustyvec::{
    Document, VectorStore, embedding::HashEmbeddingClient, qdrant::QdrantService,
    store::MetadataField,
};
use serde_json::json;

async fn store(server: &MockServer) -> VectorStore<QdrantService> {
    let backend = QdrantService::new(&server.base_url(), None).expect("client");
    VectorStore::builder(backend, Box::new(HashEmbeddingClient::new(8)))
        .index_name("docs")
        .filter_metadata_fields(vec![MetadataField::text("country")])
        .build()
        .await
        .expect("store")
}

fn point_without_country(request: &HttpMockRequest) -> bool {
    let body = request
        .body
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    body.contains("\"doc_id\":\"d\"") && !body.contains("meta_country")
}

#[tokio::test]
async fn re_add_replaces_point_payload() {
    let server = MockServer::start_async().await;
    let accepted = json!({ "result": { "operation_id": 1, "status": "completed" }, "status": "ok" });
    let first = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/docs/points")
                .query_param("wait", "true")
                .body_contains("\"meta_country\":\"UK\"");
            then.status(200).json_body(accepted.clone());
        })
        .await;

    let store = store(&server).await;
    store
        .add(vec![Document::builder().id("d").content("first").meta("country", "UK").build()])
        .await
        .expect("first add");
    first.assert_async().await;
    first.delete_async().await;

    let replacement = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/docs/points")
                .matches(point_without_country);
            then.status(200).json_body(accepted.clone());
        })
        .await;

    store
        .add(vec![Document::builder().id("d").content("second").build()])
        .await
        .expect("re-add");
    replacement.assert_async().await;
}
