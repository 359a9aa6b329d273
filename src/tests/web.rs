use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::config::ServerConfig;
use crate::semantic::Embedder;

use super::{create_service, FailingEmbedder, WordEmbedder, SAMPLE_CSV};

const BOUNDARY: &str = "highlights-test-boundary";

fn create_router(embedder: Arc<dyn Embedder>) -> (Router, tempfile::TempDir) {
    let (service, tmp) = create_service(embedder);
    let router = crate::web::router(Arc::new(service), &ServerConfig::default());
    (router, tmp)
}

fn upload_request(filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/csv\r\n\
         \r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method(Method::POST)
        .uri("/highlights")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_root_describes_api() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let (status, body) = send(&router, empty_request(Method::GET, "/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Highlights API");
    assert!(body["endpoints"]["POST /search"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_and_count() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let (status, body) = send(&router, upload_request("export.csv", SAMPLE_CSV)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert_eq!(body["message"], "Successfully stored 4 highlights");

    let (status, body) = send(&router, empty_request(Method::GET, "/highlights/count")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "count": 4 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_rejects_non_csv() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let (status, body) = send(&router, upload_request("export.txt", SAMPLE_CSV)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "File must be a CSV file");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_reports_missing_columns() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let csv = "Highlight,Book Title\nSome text,Some book\n";
    let (status, body) = send(&router, upload_request("export.csv", csv)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Missing required columns: Book Author, Tags");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_upload_embedding_failure_is_500() {
    let (router, _tmp) = create_router(Arc::new(FailingEmbedder));

    let (status, body) = send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Error storing highlights: "));
    assert!(detail.contains("embedding service unavailable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_returns_ranked_results() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));
    send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    let payload = json!({ "prompt": "The obstacle is the way", "limit": 2 });
    let (status, body) = send(&router, json_request(Method::POST, "/search", payload)).await;

    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["content"], "The obstacle is the way");
    assert_eq!(results[0]["book_title"], "Meditations");
    assert_eq!(results[0]["tags"], json!(["stoicism", "philosophy"]));
    assert_eq!(results[0]["score"], 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_filters_by_tags() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));
    send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    let payload = json!({ "prompt": "work", "tags": ["Passion"] });
    let (status, body) = send(&router, json_request(Method::POST, "/search", payload)).await;

    assert_eq!(status, StatusCode::OK);
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["tags"], json!(["work", "passion"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_not_found() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));
    send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    let payload = json!({ "prompt": "work", "tags": ["gardening"], "limit": 5 });
    let (status, body) = send(&router, json_request(Method::POST, "/search", payload)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "detail": "No highlights found matching the criteria." })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_blank_prompt_is_400() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let payload = json!({ "prompt": "  " });
    let (status, body) = send(&router, json_request(Method::POST, "/search", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Search prompt is required");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_malformed_body_is_400_with_detail() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));

    let (status, body) = send(&router, json_request(Method::POST, "/search", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Invalid request: "));
    assert!(detail.contains("prompt"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_with_query_params() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));
    send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    let (status, body) = send(
        &router,
        empty_request(Method::GET, "/highlights?skip=1&limit=2"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["skip"], 1);
    assert_eq!(body["limit"], 2);
    let highlights = body["highlights"].as_array().unwrap();
    assert_eq!(highlights.len(), 2);
    assert_eq!(
        highlights[0]["content"],
        "Waste no more time arguing about what a good man should be"
    );
    assert_eq!(highlights[0]["score"], 1.0);

    let (_, body) = send(&router, empty_request(Method::GET, "/highlights")).await;
    assert_eq!(body["skip"], 0);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["highlights"].as_array().unwrap().len(), 4);

    let (status, body) = send(&router, empty_request(Method::GET, "/highlights?limit=ten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Invalid request: "));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_removes_everything() {
    let (router, _tmp) = create_router(Arc::new(WordEmbedder));
    send(&router, upload_request("export.csv", SAMPLE_CSV)).await;

    let (status, body) = send(&router, empty_request(Method::DELETE, "/highlights/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "All highlights cleared successfully");

    let (_, body) = send(&router, empty_request(Method::GET, "/highlights/count")).await;
    assert_eq!(body["count"], 0);
}
