//! End-to-end gallery tests against the in-memory photo store.
//!
//! Run with: `cargo test -p gallery-service --test gallery_test`

use axum::body::Bytes;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use gallery_service::config::ApiConfig;
use gallery_service::{create_router, AppState, MemoryPhotoStore};
use serde_json::Value;
use std::sync::Arc;

struct TestApp {
    server: TestServer,
    store: Arc<MemoryPhotoStore>,
}

fn setup_test_app() -> TestApp {
    let store = Arc::new(MemoryPhotoStore::new());
    let state = AppState::new(store.clone());
    let server = TestServer::new(create_router(state, &ApiConfig::default()))
        .expect("failed to start test server");

    TestApp { server, store }
}

fn file_form(name: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(bytes.to_vec())
            .file_name(name)
            .mime_type("image/jpeg"),
    )
}

async fn upload(server: &TestServer, bytes: &[u8]) -> Value {
    let response = server
        .post("/upload")
        .multipart(file_form("photo.jpg", bytes))
        .await;
    assert_eq!(response.status_code(), 200);
    response.json()
}

fn is_generated_filename(name: &str) -> bool {
    name.strip_prefix("photo_")
        .and_then(|rest| rest.strip_suffix(".jpg"))
        .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

#[tokio::test]
async fn test_upload_list_and_fetch_scenario() {
    let app = setup_test_app();

    let body = upload(&app.server, b"0123456789").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Photo saved!");
    let id = body["id"].as_str().expect("upload returns the new id").to_string();

    let photos: Vec<Value> = app.server.get("/photos").await.json();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["id"], id.as_str());
    assert!(is_generated_filename(photos[0]["filename"].as_str().unwrap()));
    assert!(photos[0]["timestamp"].is_string());
    assert!(photos[0].get("image").is_none());

    let image = app.server.get(&format!("/image/{}", id)).await;
    assert_eq!(image.status_code(), 200);
    assert_eq!(image.header("content-type"), "image/jpeg");
    assert_eq!(image.as_bytes().to_vec(), b"0123456789".to_vec());
}

#[tokio::test]
async fn test_png_upload_is_still_served_as_jpeg() {
    let app = setup_test_app();
    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    let response = app
        .server
        .post("/upload")
        .multipart(MultipartForm::new().add_part(
            "file",
            Part::bytes(png.to_vec())
                .file_name("snapshot.png")
                .mime_type("image/png"),
        ))
        .await;
    let body: Value = response.json();
    let id = body["id"].as_str().unwrap();

    let photos: Vec<Value> = app.server.get("/photos").await.json();
    assert!(is_generated_filename(photos[0]["filename"].as_str().unwrap()));

    let image = app.server.get(&format!("/image/{}", id)).await;
    assert_eq!(image.header("content-type"), "image/jpeg");
    assert_eq!(image.as_bytes().to_vec(), png.to_vec());
}

#[tokio::test]
async fn test_empty_upload_is_rejected_without_record() {
    let app = setup_test_app();

    let response = app.server.post("/upload").await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "No file received");
    assert!(app.store.is_empty().await);

    let photos: Vec<Value> = app.server.get("/photos").await.json();
    assert!(photos.is_empty());
}

#[tokio::test]
async fn test_empty_multipart_body_reports_missing_file() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/upload")
        .content_type("multipart/form-data; boundary=XYZ")
        .bytes(Bytes::new())
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body, serde_json::json!({ "message": "No file received" }));
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_form_without_file_part_is_rejected() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/upload")
        .multipart(MultipartForm::new().add_text("caption", "hello"))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["message"], "No file received");
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_listing_returns_every_upload_newest_first() {
    let app = setup_test_app();

    let mut ids = Vec::new();
    for i in 0..5u8 {
        let body = upload(&app.server, &[i; 16]).await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let photos: Vec<Value> = app.server.get("/photos").await.json();
    assert_eq!(photos.len(), 5);

    let timestamps: Vec<chrono::DateTime<chrono::Utc>> = photos
        .iter()
        .map(|p| p["timestamp"].as_str().unwrap().parse().unwrap())
        .collect();
    assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));

    let listed: Vec<&str> = photos.iter().map(|p| p["id"].as_str().unwrap()).collect();
    let expected: Vec<&str> = ids.iter().rev().map(String::as_str).collect();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_unknown_id_is_404() {
    let app = setup_test_app();
    upload(&app.server, b"abc").await;

    let response = app
        .server
        .get("/image/00000000-0000-0000-0000-000000000000")
        .await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(response.text(), "Image not found");
}

#[tokio::test]
async fn test_malformed_id_is_server_error() {
    let app = setup_test_app();

    let response = app.server.get("/image/not-a-valid-id").await;

    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert_eq!(body["message"], "Error fetching image");
}

#[tokio::test]
async fn test_upload_larger_than_default_axum_limit() {
    let app = setup_test_app();
    let big = vec![0xAB; 3 * 1024 * 1024];

    let body = upload(&app.server, &big).await;
    let id = body["id"].as_str().unwrap();

    let image = app.server.get(&format!("/image/{}", id)).await;
    assert_eq!(image.as_bytes().len(), big.len());
}

#[tokio::test]
async fn test_configured_upload_cap_rejects_large_bodies() {
    let store = Arc::new(MemoryPhotoStore::new());
    let config = ApiConfig {
        max_upload_bytes: Some(1024),
        ..Default::default()
    };
    let server = TestServer::new(create_router(AppState::new(store.clone()), &config)).unwrap();

    let response = server
        .post("/upload")
        .multipart(file_form("photo.jpg", &[0u8; 4096]))
        .await;

    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to read multipart body"));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_gallery_page_and_probes() {
    let app = setup_test_app();

    let page = app.server.get("/").await;
    assert_eq!(page.status_code(), 200);
    assert!(page
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(page.text().contains("IoT Camera Photos"));

    assert_eq!(app.server.get("/health").await.status_code(), 200);
    assert_eq!(app.server.get("/ready").await.status_code(), 200);
}
