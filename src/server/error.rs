//! HTTP error envelope
//!
//! Every failure leaves the service as `{"error": "<message>"}` with a status
//! chosen from the error's kind. Full details are logged server-side.

use crate::auth::AuthError;
use crate::error::BgRemovalError;
use crate::storage::StorageError;
use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const MSG_INVALID_FORMAT: &str = "Invalid image format. Use PNG, JPG, JPEG, or WEBP.";
pub const MSG_READ_FAILED: &str = "Failed to read image data.";
pub const MSG_TOO_LARGE: &str = "Image too large. Maximum size is 10MB.";
pub const MSG_EMPTY_FILE: &str = "Empty image file.";
pub const MSG_NO_FILE: &str = "No image file provided.";
pub const MSG_DOWNLOAD_FAILED: &str = "Unable to download image from URL.";
pub const MSG_DOWNLOAD_EMPTY: &str = "Downloaded image is empty.";
pub const MSG_INVALID_URL: &str = "Invalid image URL.";
pub const MSG_NOT_FOUND: &str = "Not Found";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method Not Allowed";

/// Single-field error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    #[must_use]
    pub fn too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, MSG_TOO_LARGE)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

impl From<BgRemovalError> for ApiError {
    fn from(err: BgRemovalError) -> Self {
        match err {
            BgRemovalError::InvalidInput(message) => {
                tracing::warn!(error = %message, "Rejected undecodable image");
                Self::bad_request(message)
            },
            err @ (BgRemovalError::NoOutput | BgRemovalError::Processing(_)) => {
                tracing::error!(error = %err, "Background removal failed");
                Self::internal(err.to_string())
            },
            err => {
                tracing::error!(error = %err, "Background removal failed");
                Self::internal(format!("Processing error: {err}"))
            },
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage failure");
        Self::internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::too_large()
        } else {
            tracing::warn!(error = %err.body_text(), "Failed to read multipart upload");
            Self::bad_request(MSG_READ_FAILED)
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Request is not a multipart upload");
        Self::bad_request(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, rejection.body_text())
    }
}

/// JSON body extractor that rejects with the service's error envelope
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(ApiError::from)?;
        Ok(ValidatedJson(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_errors_are_server_faults() {
        let err = ApiError::from(BgRemovalError::inference("session failed"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Processing error: Inference error: session failed");

        let err = ApiError::from(BgRemovalError::NoOutput);
        assert_eq!(err.message, "Background removal produced no output");

        let err = ApiError::from(BgRemovalError::processing("png encoder"));
        assert_eq!(err.message, "Processing error: png encoder");
    }

    #[test]
    fn test_corrupt_image_is_bad_request() {
        let err = ApiError::from(BgRemovalError::invalid_input(
            "Invalid or corrupted image: unexpected EOF",
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid or corrupted image: unexpected EOF");
    }

    #[test]
    fn test_auth_and_storage_mapping() {
        let err = ApiError::from(AuthError::Invalid);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid or missing API key");

        let err = ApiError::from(StorageError::NotConfigured);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.starts_with("Storage not configured"));
    }
}
