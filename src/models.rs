//! Model registry and model file management
//!
//! The service runs U²-Net style salient-object models exported to ONNX. A
//! model is identified by name; its weights are either supplied as an
//! explicit file or fetched once into a local cache directory.

use crate::config::ModelConfig;
use crate::download::ModelDownloader;
use crate::error::{BgRemovalError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Release location of the prebuilt ONNX weights
const MODEL_RELEASE_BASE: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// ImageNet normalization shared by the U²-Net family
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocessing parameters expected by a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Model input size as `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// A known segmentation model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    /// Download location of the ONNX file
    pub url: String,
    /// File name inside the cache directory
    pub file_name: String,
    /// Expected SHA-256 of the ONNX file, when pinned
    pub sha256: Option<&'static str>,
    pub preprocessing: PreprocessingConfig,
}

impl ModelSpec {
    /// Names accepted by [`ModelSpec::by_name`]
    pub const AVAILABLE: &'static [&'static str] = &["u2net", "u2netp", "isnet-general-use"];

    /// Look up a built-in model
    ///
    /// # Errors
    /// - Unknown model name
    pub fn by_name(name: &str) -> Result<Self> {
        let (name, preprocessing) = match name {
            "u2net" => ("u2net", Self::u2net_preprocessing()),
            "u2netp" => ("u2netp", Self::u2net_preprocessing()),
            "isnet-general-use" => (
                "isnet-general-use",
                PreprocessingConfig {
                    target_size: [1024, 1024],
                    normalization_mean: [0.5, 0.5, 0.5],
                    normalization_std: [1.0, 1.0, 1.0],
                },
            ),
            other => {
                return Err(BgRemovalError::invalid_config(format!(
                    "Unknown model '{}'. Available models: {}",
                    other,
                    Self::AVAILABLE.join(", ")
                )))
            },
        };

        let file_name = format!("{name}.onnx");
        Ok(Self {
            name,
            url: format!("{MODEL_RELEASE_BASE}/{file_name}"),
            file_name,
            sha256: None,
            preprocessing,
        })
    }

    fn u2net_preprocessing() -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [320, 320],
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
        }
    }

    /// Expected tensor shapes for this model
    #[must_use]
    pub fn shapes(&self) -> ((usize, usize, usize, usize), (usize, usize, usize, usize)) {
        let [width, height] = self.preprocessing.target_size;
        let (w, h) = (width as usize, height as usize);
        ((1, 3, h, w), (1, 1, h, w))
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            name: "u2net",
            url: format!("{MODEL_RELEASE_BASE}/u2net.onnx"),
            file_name: "u2net.onnx".to_string(),
            sha256: None,
            preprocessing: Self::u2net_preprocessing(),
        }
    }
}

/// Resolves, downloads and loads model files
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
    model_path: Option<PathBuf>,
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a manager for the configured model
    ///
    /// Cache location, in order: the configured `U2NET_HOME`, then `~/.u2net`.
    ///
    /// # Errors
    /// - No cache directory override and no home directory
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let cache_dir = match &config.model_home {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(
                        "Failed to determine home directory. Set U2NET_HOME or MODEL_PATH.",
                    )
                })?
                .join(".u2net"),
        };

        Ok(Self {
            spec: config.spec.clone(),
            model_path: config.model_path.clone(),
            cache_dir,
        })
    }

    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path where the model file lives (explicit path or cache entry)
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(&self.spec.file_name))
    }

    /// Make sure the model file exists locally, downloading it on first use
    ///
    /// # Errors
    /// - Explicit model path does not exist
    /// - Download or integrity verification failures
    pub async fn ensure_available(&self) -> Result<PathBuf> {
        let path = self.model_path();

        if path.is_file() {
            log::debug!("Using model file {}", path.display());
            return Ok(path);
        }

        if self.model_path.is_some() {
            return Err(BgRemovalError::model(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("create model cache directory", &self.cache_dir, &e)
        })?;

        log::info!(
            "Model '{}' not cached, downloading from {}",
            self.spec.name,
            self.spec.url
        );
        let downloader = ModelDownloader::new()?;
        downloader
            .download_file(&self.spec.url, &path, self.spec.sha256)
            .await?;

        Ok(path)
    }

    /// Read the model file into memory
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.model_path();
        fs::read(&path).map_err(|e| BgRemovalError::file_io_error("read model file", &path, &e))
    }

    /// Model metadata for the loaded weights
    #[must_use]
    pub fn info(&self, size_bytes: usize) -> ModelInfo {
        let (input_shape, output_shape) = self.spec.shapes();
        ModelInfo {
            name: self.spec.name.to_string(),
            size_bytes,
            input_shape,
            output_shape,
        }
    }
}
