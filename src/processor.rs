//! Background removal processor
//!
//! `ImageProcessor` owns the shared inference backend and runs the full
//! pipeline: decode, preprocess, infer, build the mask, composite the cutout
//! and encode it as PNG. The backend is created on first use through a
//! [`BackendFactory`] and reused by every later request.

use crate::{
    config::{BackendType, ModelConfig},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::ModelManager,
    utils::{ImagePreprocessor, SegmentationMask},
};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, span, warn, Level};

/// Creates inference backends
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Create a ready-to-run backend
    ///
    /// # Errors
    ///
    /// Returns `BgRemovalError` for:
    /// - Unsupported backend types
    /// - Model download or loading failures
    async fn create_backend(&self) -> Result<Arc<dyn InferenceBackend>>;

    /// Backend this factory produces, if it is a real runtime
    fn backend_type(&self) -> Option<BackendType>;
}

/// Factory that resolves the configured model and loads it into ONNX Runtime
/// or Tract
#[derive(Debug, Clone)]
pub struct DefaultBackendFactory {
    config: ModelConfig,
}

impl DefaultBackendFactory {
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    fn load(manager: &ModelManager, config: &ModelConfig) -> Result<Arc<dyn InferenceBackend>> {
        match config.backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Arc::new(crate::backends::OnnxBackend::load(
                manager, config,
            )?)),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Arc::new(crate::backends::TractBackend::load(
                manager, config,
            )?)),
            #[allow(unreachable_patterns)]
            other => {
                let _ = manager;
                Err(BgRemovalError::invalid_config(format!(
                    "Backend '{other}' is not compiled into this build"
                )))
            },
        }
    }
}

#[async_trait]
impl BackendFactory for DefaultBackendFactory {
    async fn create_backend(&self) -> Result<Arc<dyn InferenceBackend>> {
        let manager = ModelManager::from_config(&self.config)?;
        manager.ensure_available().await?;

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || Self::load(&manager, &config))
            .await
            .map_err(|e| BgRemovalError::internal(format!("Model loading task failed: {e}")))?
    }

    fn backend_type(&self) -> Option<BackendType> {
        Some(self.config.backend_type)
    }
}

/// Cutout encoded as an RGBA PNG
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Background removal pipeline with a lazily created, shared backend
pub struct ImageProcessor {
    factory: Arc<dyn BackendFactory>,
    backend: OnceCell<Arc<dyn InferenceBackend>>,
}

impl std::fmt::Debug for ImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProcessor")
            .field("backend_type", &self.factory.backend_type())
            .field("model_loaded", &self.is_model_loaded())
            .finish()
    }
}

impl ImageProcessor {
    #[must_use]
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            backend: OnceCell::new(),
        }
    }

    /// Whether the backend has been created
    #[must_use]
    pub fn is_model_loaded(&self) -> bool {
        self.backend.initialized()
    }

    /// Shared backend, created on first call
    ///
    /// Concurrent first callers wait for a single creation. A failed creation
    /// is not remembered; the next call tries again.
    ///
    /// # Errors
    /// - Backend creation failures from the factory
    pub async fn backend(&self) -> Result<Arc<dyn InferenceBackend>> {
        self.backend
            .get_or_try_init(|| async {
                let start = Instant::now();
                info!(backend = ?self.factory.backend_type(), "Loading segmentation model");
                let backend = self.factory.create_backend().await.map_err(|e| {
                    warn!(error = %e, "Model initialization failed");
                    e
                })?;
                info!(
                    backend = backend.name(),
                    model = %backend.model_info().name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Segmentation model ready"
                );
                Ok(backend)
            })
            .await
            .cloned()
    }

    /// Create the backend ahead of the first request
    ///
    /// # Errors
    /// - Backend creation failures from the factory
    pub async fn preload(&self) -> Result<()> {
        self.backend().await.map(|_| ())
    }

    /// Remove the background from an encoded image
    ///
    /// # Errors
    /// - `InvalidInput` when the bytes cannot be decoded
    /// - Backend creation or inference failures
    /// - `NoOutput` when the model returns an empty prediction
    #[instrument(skip_all, fields(input_bytes = bytes.len()))]
    pub async fn process(&self, bytes: Bytes) -> Result<ProcessedImage> {
        let image = tokio::task::spawn_blocking(move || Self::decode(&bytes))
            .await
            .map_err(|e| BgRemovalError::internal(format!("Decode task failed: {e}")))??;

        let backend = self.backend().await?;

        tokio::task::spawn_blocking(move || Self::remove_background(backend.as_ref(), &image))
            .await
            .map_err(|e| BgRemovalError::internal(format!("Processing task failed: {e}")))?
    }

    /// Decode PNG, JPEG or WebP bytes
    ///
    /// # Errors
    /// - `InvalidInput` for undecodable data
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| BgRemovalError::invalid_input(format!("Invalid or corrupted image: {e}")))
    }

    /// Run the synchronous part of the pipeline on a decoded image
    ///
    /// # Errors
    /// - Preprocessing, inference, compositing or encoding failures
    pub fn remove_background(
        backend: &dyn InferenceBackend,
        image: &DynamicImage,
    ) -> Result<ProcessedImage> {
        let total_start = Instant::now();
        let source = image.to_rgba8();
        let (width, height) = source.dimensions();

        let input_tensor = {
            let _span = span!(Level::DEBUG, "preprocessing", width, height).entered();
            ImagePreprocessor::preprocess_for_inference(image, backend.preprocessing_config())?
        };

        let prediction = {
            let _span = span!(Level::DEBUG, "inference", backend = backend.name()).entered();
            backend.infer(&input_tensor)?
        };

        let cutout = {
            let _span = span!(Level::DEBUG, "background_removal", width, height).entered();
            let mask = SegmentationMask::from_prediction(&prediction)?.resize(width, height);
            mask.apply(&source)?
        };

        if cutout.dimensions() != (width, height) {
            return Err(BgRemovalError::processing(format!(
                "Output is {}x{} but input was {width}x{height}",
                cutout.width(),
                cutout.height()
            )));
        }

        let mut png = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut png, CompressionType::Default, PngFilterType::Adaptive);
        cutout
            .write_with_encoder(encoder)
            .map_err(|e| BgRemovalError::processing(format!("Failed to encode PNG: {e}")))?;

        debug!(
            width,
            height,
            png_bytes = png.len(),
            elapsed_ms = total_start.elapsed().as_millis() as u64,
            "Background removed"
        );

        Ok(ProcessedImage { png, width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockBackendFactory, MockBehavior};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(image: DynamicImage, format: ImageFormat) -> Bytes {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        Bytes::from(buffer.into_inner())
    }

    fn processor(behavior: MockBehavior) -> ImageProcessor {
        ImageProcessor::new(Arc::new(MockBackendFactory::new(behavior)))
    }

    #[tokio::test]
    async fn test_png_output_keeps_dimensions() {
        let input = DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb([200, 30, 30])));
        let result = processor(MockBehavior::Circle)
            .process(encode(input, ImageFormat::Png))
            .await
            .unwrap();

        assert_eq!((result.width, result.height), (120, 80));

        let decoded = image::load_from_memory_with_format(&result.png, ImageFormat::Png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgba8);
        let decoded = decoded.to_rgba8();
        assert_eq!(decoded.get_pixel(60, 40).0[3], 255);
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_jpeg_input() {
        let input = DynamicImage::ImageRgb8(RgbImage::from_pixel(33, 17, Rgb([10, 200, 10])));
        let result = processor(MockBehavior::Circle)
            .process(encode(input, ImageFormat::Jpeg))
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (33, 17));
    }

    #[tokio::test]
    async fn test_corrupt_input_is_client_error() {
        let processor = processor(MockBehavior::Circle);
        let err = processor
            .process(Bytes::from_static(b"definitely not an image"))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().starts_with("Invalid or corrupted image"));
        // decoding happens before the model is touched
        assert!(!processor.is_model_loaded());
    }

    #[tokio::test]
    async fn test_empty_prediction() {
        let input = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let err = processor(MockBehavior::Empty)
            .process(encode(input, ImageFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::NoOutput));
    }

    #[tokio::test]
    async fn test_inference_failure() {
        let input = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let err = processor(MockBehavior::Fail)
            .process(encode(input, ImageFormat::Png))
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Inference(_)));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_preload() {
        let processor = processor(MockBehavior::Circle);
        assert!(!processor.is_model_loaded());
        processor.preload().await.unwrap();
        assert!(processor.is_model_loaded());
    }

    #[cfg(not(any(feature = "onnx", feature = "tract")))]
    #[tokio::test]
    async fn test_default_factory_without_backends() {
        let temp = tempfile::TempDir::new().unwrap();
        let model_path = temp.path().join("u2net.onnx");
        std::fs::write(&model_path, b"weights").unwrap();

        let factory = DefaultBackendFactory::new(ModelConfig {
            model_path: Some(model_path),
            ..ModelConfig::default()
        });
        assert!(factory.create_backend().await.is_err());
    }
}
