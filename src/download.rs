//! Model file downloading
//!
//! Streams a model file to a temporary sibling path, verifies it, and moves it
//! into place so a partially written file never looks like a cached model.

use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Model downloader
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    client: Client,
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// Download `url` to `local_path`, optionally checking its SHA-256
    ///
    /// # Errors
    /// - Network errors or non-success HTTP status
    /// - File system errors while writing
    /// - Hash mismatch
    pub async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<()> {
        let temp_path = Self::temp_path(local_path);

        match self.stream_to_file(url, &temp_path).await {
            Ok(downloaded) => {
                if !Self::verify_file_integrity(&temp_path, expected_sha256)? {
                    Self::cleanup(&temp_path);
                    return Err(BgRemovalError::model(format!(
                        "Integrity check failed for {}",
                        url
                    )));
                }

                fs::rename(&temp_path, local_path).map_err(|e| {
                    BgRemovalError::file_io_error("move downloaded model to cache", local_path, &e)
                })?;

                log::info!(
                    "Downloaded {:.1} MB to {}",
                    downloaded as f64 / (1024.0 * 1024.0),
                    local_path.display()
                );
                Ok(())
            },
            Err(e) => {
                Self::cleanup(&temp_path);
                Err(e)
            },
        }
    }

    fn temp_path(local_path: &Path) -> PathBuf {
        let mut name = local_path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".part");
        local_path.with_file_name(name)
    }

    fn cleanup(temp_path: &Path) {
        if temp_path.exists() {
            if let Err(cleanup_err) = fs::remove_file(temp_path) {
                log::warn!("Failed to cleanup partial download: {}", cleanup_err);
            }
        }
    }

    /// Stream the response body to disk, returning the number of bytes written
    async fn stream_to_file(&self, url: &str, local_path: &Path) -> Result<u64> {
        log::debug!("Downloading: {} -> {}", url, local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }

        let response =
            self.client.get(url).send().await.map_err(|e| {
                BgRemovalError::network_error(format!("Failed to download {}", url), e)
            })?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {}", url),
                format!("HTTP {}", response.status()),
            ));
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let downloaded = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        log::debug!(
            "Downloaded {} bytes to {}",
            downloaded,
            local_path.display()
        );
        Ok(downloaded)
    }

    /// Verify the integrity of a downloaded file using SHA-256
    ///
    /// Returns `Ok(true)` when no hash is pinned.
    ///
    /// # Errors
    /// - File cannot be read
    pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
        let Some(expected) = expected_hash else {
            return Ok(true);
        };

        let contents = fs::read(file_path).map_err(|e| {
            BgRemovalError::file_io_error("read file for verification", file_path, &e)
        })?;

        let actual_hash = format!("{:x}", Sha256::digest(&contents));

        if actual_hash.eq_ignore_ascii_case(expected) {
            Ok(true)
        } else {
            log::warn!(
                "File integrity check failed for {}: expected {}, got {}",
                file_path.display(),
                expected,
                actual_hash
            );
            Ok(false)
        }
    }
}
