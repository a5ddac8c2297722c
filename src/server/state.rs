//! Shared application state

use crate::auth::Authenticator;
use crate::error::{BgRemovalError, Result};
use crate::processor::ImageProcessor;
use crate::storage::StorageUploader;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for fetching caller-supplied image URLs
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// State handed to every handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub processor: Arc<ImageProcessor>,
    pub uploader: Arc<StorageUploader>,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Assemble state and the HTTP client used for URL downloads
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(
        authenticator: Authenticator,
        processor: ImageProcessor,
        uploader: StorageUploader,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            authenticator: Arc::new(authenticator),
            processor: Arc::new(processor),
            uploader: Arc::new(uploader),
            http_client,
        })
    }
}
