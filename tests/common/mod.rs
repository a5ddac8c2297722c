//! Shared fixtures for integration tests

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request};
use bgremove_api::{
    backends::{MockBackendFactory, MockBehavior},
    config::StorageConfig,
    processor::ImageProcessor,
    storage::{MemoryStorage, StorageUploader},
    AppState, Authenticator,
};
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY: &str = "test-secret-key";
pub const BOUNDARY: &str = "bgremove-test-boundary";
pub const PUBLIC_BASE: &str = "https://cdn.example.com/";

/// Everything a test needs to drive the router and inspect side effects
pub struct TestContext {
    pub state: AppState,
    pub storage: Arc<MemoryStorage>,
    pub factory: Arc<MockBackendFactory>,
}

/// Complete credentials; URL policy depends on `public_base_url` and `endpoint`
pub fn storage_config(public_base_url: Option<&str>, endpoint: Option<&str>) -> StorageConfig {
    StorageConfig {
        bucket: Some("images".to_string()),
        region: Some("eu-west-1".to_string()),
        access_key_id: Some("AKIDEXAMPLE".to_string()),
        secret_access_key: Some("secret".to_string()),
        endpoint: endpoint.map(str::to_string),
        public_base_url: public_base_url.map(str::to_string),
        presigned_expiry: Duration::from_secs(3600),
    }
}

pub fn context_with(api_key: Option<&str>, config: StorageConfig) -> TestContext {
    let storage = Arc::new(MemoryStorage::new());
    let factory = Arc::new(MockBackendFactory::new(MockBehavior::Circle));
    let uploader = StorageUploader::with_client(config, storage.clone());
    let processor = ImageProcessor::new(factory.clone());
    let state = AppState::new(
        Authenticator::new(api_key.map(str::to_string)),
        processor,
        uploader,
    )
    .unwrap();

    TestContext {
        state,
        storage,
        factory,
    }
}

/// Configured key, public base URL, mock model
pub fn test_context() -> TestContext {
    context_with(Some(API_KEY), storage_config(Some(PUBLIC_BASE), None))
}

/// Solid-color image encoded in `format`
pub fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 160, 90])));
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}

pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    encoded_image(width, height, ImageFormat::Png)
}

/// Multipart body with one file field
pub fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn binary_request(api_key: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/remove-bg/binary")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn url_request(api_key: Option<&str>, json: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/remove-bg/url")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(json.to_string())).unwrap()
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}
