//! Tract backend
//!
//! Pure Rust inference for environments where the ONNX Runtime shared
//! library is unavailable. CPU only.

use crate::config::ModelConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::{into_array4, InferenceBackend};
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use std::time::Instant;
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models in pure Rust
#[derive(Debug)]
pub struct TractBackend {
    model: TractModel,
    preprocessing: PreprocessingConfig,
    info: ModelInfo,
}

impl TractBackend {
    /// Load and optimize the model resolved by `manager`
    ///
    /// The input fact is pinned to the model's preprocessing size so Tract can
    /// fully type the graph.
    ///
    /// # Errors
    /// - Model file cannot be read
    /// - ONNX parsing or optimization failures
    pub fn load(manager: &ModelManager, _config: &ModelConfig) -> Result<Self> {
        let model_load_start = Instant::now();
        let model_data = manager.load_model()?;
        let info = manager.info(model_data.len());
        let (n, c, h, w) = info.input_shape;

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(&model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([n, c, h, w]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "✅ Tract model '{}' loaded in {}ms ({:.1} MB)",
            info.name,
            model_load_start.elapsed().as_millis(),
            info.size_bytes as f64 / (1024.0 * 1024.0)
        );

        Ok(Self {
            model,
            preprocessing: manager.spec().preprocessing.clone(),
            info,
        })
    }
}

impl InferenceBackend for TractBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();

        let (n, c, h, w) = input.dim();
        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| BgRemovalError::inference("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape(&[n, c, h, w], data).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let view = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;
        let output = into_array4(view.shape(), view.iter().copied().collect())?;

        log::debug!(
            "Tract inference completed in {}ms, output shape {:?}",
            inference_start.elapsed().as_millis(),
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
        "tract"
    }
}
