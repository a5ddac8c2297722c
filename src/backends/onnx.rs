//! ONNX Runtime backend
//!
//! Runs the segmentation model with ONNX Runtime, picking a hardware
//! execution provider when one is available. The session is created once and
//! shared; runs are serialized through a mutex because `Session::run` needs
//! exclusive access.

use crate::config::{ExecutionProvider, ModelConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::{into_array4, InferenceBackend};
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use std::sync::Mutex;
use std::time::Instant;

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Mutex<Session>,
    preprocessing: PreprocessingConfig,
    info: ModelInfo,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with their availability
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool)> {
        vec![
            ("CPU".to_string(), true),
            (
                "CUDA".to_string(),
                OrtExecutionProvider::is_available(&CUDAExecutionProvider::default())
                    .unwrap_or(false),
            ),
            (
                "CoreML".to_string(),
                OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                    .unwrap_or(false),
            ),
        ]
    }

    /// Load the model file resolved by `manager` into a new session
    ///
    /// Blocking; call from a blocking-friendly context.
    ///
    /// # Errors
    /// - Model file cannot be read
    /// - Session creation or provider configuration failures
    pub fn load(manager: &ModelManager, config: &ModelConfig) -> Result<Self> {
        let model_load_start = Instant::now();
        let model_data = manager.load_model()?;

        let session_builder = Session::builder()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let session_builder = Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::inference(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create session from model data: {e}"))
            })?;

        let info = manager.info(model_data.len());
        log::info!(
            "📊 ONNX model '{}' loaded in {:.0}ms ({:.1} MB, {} intra-op threads)",
            info.name,
            model_load_start.elapsed().as_secs_f64() * 1000.0,
            info.size_bytes as f64 / (1024.0 * 1024.0),
            intra_threads
        );

        Ok(Self {
            session: Mutex::new(session),
            preprocessing: manager.spec().preprocessing.clone(),
            info,
        })
    }

    fn configure_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_available =
            || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
        };

        let providers = match provider {
            ExecutionProvider::Auto => {
                // CUDA > CoreML > CPU
                let mut providers = Vec::new();
                if cuda_available() {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    log::info!("Using CUDA execution provider");
                    vec![CUDAExecutionProvider::default().build()]
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    vec![CoreMLExecutionProvider::default().with_subgraphs(true).build()]
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(session_builder);
        }

        session_builder
            .with_execution_providers(providers)
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to set execution providers: {e}"))
            })
    }
}

impl InferenceBackend for OnnxBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| BgRemovalError::internal("ONNX session lock poisoned"))?;

        // Positional inputs; the exported models name their tensors differently
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let (shape, data) = {
            let first_key = outputs
                .keys()
                .next()
                .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
            let tensor = outputs
                .get(first_key)
                .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
                })?;
            (tensor.shape().to_vec(), tensor.iter().copied().collect::<Vec<f32>>())
        };
        drop(outputs);
        drop(session);

        let output = into_array4(&shape, data)?;

        log::debug!(
            "Inference complete: {:.2}ms, output shape {:?}",
            inference_start.elapsed().as_secs_f64() * 1000.0,
            output.dim()
        );
        Ok(output)
    }

    fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    fn name(&self) -> &'static str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_providers_always_has_cpu() {
        let providers = OnnxBackend::list_providers();
        assert_eq!(providers.len(), 3);
        assert_eq!(providers[0], ("CPU".to_string(), true));
    }

    #[test]
    fn test_load_rejects_invalid_model_data() {
        let temp = TempDir::new().unwrap();
        let model_path = temp.path().join("broken.onnx");
        std::fs::write(&model_path, b"not an onnx graph").unwrap();

        let config = ModelConfig {
            model_path: Some(model_path),
            execution_provider: ExecutionProvider::Cpu,
            ..ModelConfig::default()
        };
        let manager = ModelManager::from_config(&config).unwrap();

        assert!(OnnxBackend::load(&manager, &config).is_err());
    }
}
