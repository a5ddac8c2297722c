#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal API
//!
//! HTTP service that removes the background from images with a U2-Net
//! family segmentation model and publishes the transparent PNG cutout to
//! S3-compatible object storage.
//!
//! ## Features
//!
//! - **Two intake routes**: multipart upload and fetch-by-URL
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Lazy model loading**: the model is downloaded and loaded once, on first use
//! - **Storage**: S3, R2, MinIO or any S3-compatible endpoint, with public or presigned URLs
//! - **API key authentication** with constant-time comparison
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use bgremove_api::{
//!     config::ModelConfig,
//!     processor::{DefaultBackendFactory, ImageProcessor},
//! };
//! use std::sync::Arc;
//!
//! # async fn example(upload: bytes::Bytes) -> anyhow::Result<()> {
//! let processor = ImageProcessor::new(Arc::new(DefaultBackendFactory::new(
//!     ModelConfig::default(),
//! )));
//! let cutout = processor.process(upload).await?;
//! std::fs::write("cutout.png", &cutout.png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): server binary with argument parsing and log output
//! - `tracing-json`: JSON log lines

pub mod auth;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod server;
pub mod storage;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

pub use auth::{AuthError, Authenticator};
pub use config::{BackendType, ExecutionProvider, ModelConfig, ServerConfig, StorageConfig};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelInfo, ModelManager, ModelSpec, PreprocessingConfig};
pub use processor::{BackendFactory, DefaultBackendFactory, ImageProcessor, ProcessedImage};
pub use server::{create_app, create_router, AppState};
pub use storage::{ObjectStorage, StorageError, StorageUploader};
pub use utils::{ImagePreprocessor, SegmentationMask};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};
