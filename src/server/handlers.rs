//! Request handlers

use super::error::{
    ApiError, ValidatedJson, MSG_DOWNLOAD_EMPTY, MSG_DOWNLOAD_FAILED, MSG_EMPTY_FILE,
    MSG_INVALID_FORMAT, MSG_INVALID_URL, MSG_METHOD_NOT_ALLOWED, MSG_NOT_FOUND, MSG_NO_FILE,
};
use super::extract::ApiKey;
use super::state::AppState;
use super::{ALLOWED_CONTENT_TYPES, IMAGE_FIELD, MAX_IMAGE_SIZE_BYTES};
use crate::storage::PNG_CONTENT_TYPE;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Body of a successful removal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    pub success: bool,
    /// Source URL, empty for uploads
    pub original_url: String,
    pub processed_url: String,
    /// Seconds, two decimal places
    pub processing_time: f64,
    pub image_dimensions: ImageDimensions,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlRequest {
    pub image_url: String,
}

/// Whether a declared content type is an accepted image type
#[must_use]
pub fn is_allowed_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
}

fn round_seconds(start: Instant) -> f64 {
    (start.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

/// `POST /api/v1/remove-bg/binary`
#[instrument(skip_all)]
pub async fn remove_bg_binary(
    State(state): State<AppState>,
    _key: ApiKey,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let mut multipart = multipart?;

    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            image = Some(read_image_field(field).await?);
            break;
        }
    }
    let data = image.ok_or_else(|| ApiError::bad_request(MSG_NO_FILE))?;
    if data.is_empty() {
        return Err(ApiError::bad_request(MSG_EMPTY_FILE));
    }

    let start = Instant::now();
    let response = process_and_store(&state, data, String::new(), start).await?;
    Ok(Json(response))
}

/// Validate the declared type, then buffer the field up to the size limit
async fn read_image_field(mut field: Field<'_>) -> Result<Bytes, ApiError> {
    let content_type = field.content_type().unwrap_or_default();
    if !is_allowed_content_type(content_type) {
        warn!(content_type, "Rejected upload with unsupported content type");
        return Err(ApiError::bad_request(MSG_INVALID_FORMAT));
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if buffer.len() + chunk.len() > MAX_IMAGE_SIZE_BYTES {
            return Err(ApiError::too_large());
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(buffer.freeze())
}

/// `POST /api/v1/remove-bg/url`
#[instrument(skip_all)]
pub async fn remove_bg_url(
    State(state): State<AppState>,
    _key: ApiKey,
    ValidatedJson(request): ValidatedJson<UrlRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let start = Instant::now();

    let image_url = request.image_url.trim();
    let url = reqwest::Url::parse(image_url)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .ok_or_else(|| ApiError::unprocessable(MSG_INVALID_URL))?;

    let data = download_image(&state.http_client, url).await?;

    let response = process_and_store(&state, data, image_url.to_string(), start).await?;
    Ok(Json(response))
}

/// Fetch a remote image, enforcing the same size limit as uploads
async fn download_image(client: &reqwest::Client, url: reqwest::Url) -> Result<Bytes, ApiError> {
    let mut response = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!(url = %url, error = %e, "Image download failed");
            ApiError::unprocessable(MSG_DOWNLOAD_FAILED)
        })?;

    if response
        .content_length()
        .is_some_and(|len| len > MAX_IMAGE_SIZE_BYTES as u64)
    {
        return Err(ApiError::too_large());
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        warn!(url = %url, error = %e, "Image download interrupted");
        ApiError::unprocessable(MSG_DOWNLOAD_FAILED)
    })? {
        if buffer.len() + chunk.len() > MAX_IMAGE_SIZE_BYTES {
            return Err(ApiError::too_large());
        }
        buffer.extend_from_slice(&chunk);
    }

    if buffer.is_empty() {
        return Err(ApiError::unprocessable(MSG_DOWNLOAD_EMPTY));
    }

    Ok(buffer.freeze())
}

async fn process_and_store(
    state: &AppState,
    data: Bytes,
    original_url: String,
    start: Instant,
) -> Result<SuccessResponse, ApiError> {
    let input_bytes = data.len();
    let processed = state.processor.process(data).await?;

    let processed_url = state
        .uploader
        .upload(Bytes::from(processed.png), PNG_CONTENT_TYPE)
        .await?;

    let processing_time = round_seconds(start);
    info!(
        input_bytes,
        width = processed.width,
        height = processed.height,
        processing_time,
        "Background removed and stored"
    );

    Ok(SuccessResponse {
        success: true,
        original_url,
        processed_url,
        processing_time,
        image_dimensions: ImageDimensions {
            width: processed.width,
            height: processed.height,
        },
    })
}

/// Unmatched path
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, MSG_NOT_FOUND)
}

/// Known path, unsupported method
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, MSG_METHOD_NOT_ALLOWED)
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Background removal API",
        "health": "/health",
        "endpoints": {
            "remove_bg_binary": "POST /api/v1/remove-bg/binary",
            "remove_bg_url": "POST /api/v1/remove-bg/url",
        },
    }))
}
