//! Request extractors

use super::error::ApiError;
use super::state::AppState;
use crate::auth::API_KEY_HEADER;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Proof that the request carried a valid `X-API-Key`
///
/// Place before any body extractor so authentication runs first.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequestParts<AppState> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        state.authenticator.verify(supplied)?;
        Ok(ApiKey)
    }
}
