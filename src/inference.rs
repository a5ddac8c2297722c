//! Inference backend abstraction

use crate::error::Result;
use crate::models::{ModelInfo, PreprocessingConfig};
use ndarray::Array4;

/// A loaded segmentation model ready to run
///
/// Backends are shared between concurrent requests, so `infer` takes `&self`;
/// implementations that need exclusive access to their runtime serialize
/// internally.
pub trait InferenceBackend: Send + Sync {
    /// Run inference on an NCHW input tensor
    ///
    /// Returns the model's primary output, shaped `(1, C, H, W)`; channel 0
    /// holds the saliency map.
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion errors
    /// - Output that is not a 4D tensor
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Preprocessing the model expects
    fn preprocessing_config(&self) -> &PreprocessingConfig;

    /// Model metadata
    fn model_info(&self) -> &ModelInfo;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Convert a dynamic-rank model output into a 4D array
///
/// # Errors
/// - Output rank is not 4
#[cfg(any(feature = "onnx", feature = "tract"))]
pub(crate) fn into_array4(shape: &[usize], data: Vec<f32>) -> Result<Array4<f32>> {
    let &[n, c, h, w] = shape else {
        return Err(crate::error::BgRemovalError::inference(format!(
            "Expected 4D output tensor, got {}D",
            shape.len()
        )));
    };

    Array4::from_shape_vec((n, c, h, w), data).map_err(|e| {
        crate::error::BgRemovalError::inference(format!("Failed to reshape output tensor: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;

    #[test]
    #[cfg(any(feature = "onnx", feature = "tract"))]
    fn test_into_array4() {
        let array = into_array4(&[1, 1, 2, 2], vec![0.0, 0.25, 0.5, 1.0]).unwrap();
        assert_eq!(array.dim(), (1, 1, 2, 2));
        assert!((array[[0, 0, 1, 1]] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    #[cfg(any(feature = "onnx", feature = "tract"))]
    fn test_into_array4_rejects_other_ranks() {
        let err = into_array4(&[1, 4], vec![0.0; 4]).unwrap_err();
        assert!(err.to_string().contains("Expected 4D output tensor, got 2D"));

        assert!(into_array4(&[1, 1, 2, 2], vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_backend_is_object_safe() {
        let backend: Box<dyn InferenceBackend> = Box::new(MockBackend::new());
        let [width, height] = backend.preprocessing_config().target_size;
        let input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let output = backend.infer(&input).unwrap();
        assert_eq!(output.dim(), (1, 1, height as usize, width as usize));
        assert_eq!(backend.model_info().input_shape.1, 3);
    }
}
