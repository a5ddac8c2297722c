//! Mock backend for tests and benchmarks
//!
//! Produces a centered circular saliency map without loading any model, so
//! the full HTTP and processing pipeline can run in CI.

use crate::config::BackendType;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelSpec, PreprocessingConfig};
use crate::processor::BackendFactory;
use async_trait::async_trait;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the mock backend returns from `infer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    /// Foreground disc in the middle of the frame
    #[default]
    Circle,
    /// Inference fails
    Fail,
    /// A tensor with no channels
    Empty,
    /// The same value everywhere
    Flat,
}

/// Mock backend for testing without model files
#[derive(Debug)]
pub struct MockBackend {
    behavior: MockBehavior,
    preprocessing: PreprocessingConfig,
    info: ModelInfo,
}

impl MockBackend {
    /// Create a mock with u2net's input geometry
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::Circle)
    }

    #[must_use]
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let spec = ModelSpec::default();
        let (input_shape, output_shape) = spec.shapes();
        Self {
            behavior,
            preprocessing: spec.preprocessing,
            info: ModelInfo {
                name: "mock".to_string(),
                size_bytes: 0,
                input_shape,
                output_shape,
            },
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let (n, _c, h, w) = input.dim();

        match self.behavior {
            MockBehavior::Fail => Err(BgRemovalError::inference("mock inference failure")),
            MockBehavior::Empty => Ok(Array4::zeros((n, 0, h, w))),
            MockBehavior::Flat => Ok(Array4::from_elem((n, 1, h, w), 0.7)),
            MockBehavior::Circle => {
                let (cy, cx) = (h as f32 / 2.0, w as f32 / 2.0);
                let radius = h.min(w) as f32 / 3.0;
                // logits, so the processor's min-max normalization is exercised
                Ok(Array4::from_shape_fn((n, 1, h, w), |(_, _, y, x)| {
                    let (dy, dx) = (y as f32 + 0.5 - cy, x as f32 + 0.5 - cx);
                    if dy.hypot(dx) <= radius {
                        4.0
                    } else {
                        -4.0
                    }
                }))
            },
        }
    }

    fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Factory handing out [`MockBackend`]s and counting how often it is asked
#[derive(Debug, Default)]
pub struct MockBackendFactory {
    behavior: MockBehavior,
    delay: Option<Duration>,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Sleep before creating the backend, widening the first-use window
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the first `count` creation attempts
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Number of times `create_backend` has been called
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendFactory for MockBackendFactory {
    async fn create_backend(&self) -> Result<Arc<dyn InferenceBackend>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BgRemovalError::model("mock model failed to load"));
        }

        Ok(Arc::new(MockBackend::with_behavior(self.behavior)))
    }

    fn backend_type(&self) -> Option<BackendType> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_mask_has_foreground_and_background() {
        let backend = MockBackend::new();
        let output = backend.infer(&Array4::zeros((1, 3, 320, 320))).unwrap();

        assert_eq!(output.dim(), (1, 1, 320, 320));
        assert!((output[[0, 0, 160, 160]] - 4.0).abs() < f32::EPSILON);
        assert!((output[[0, 0, 0, 0]] + 4.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_failure_modes() {
        let input = Array4::zeros((1, 3, 8, 8));
        assert!(MockBackend::with_behavior(MockBehavior::Fail).infer(&input).is_err());

        let empty = MockBackend::with_behavior(MockBehavior::Empty).infer(&input).unwrap();
        assert_eq!(empty.len(), 0);
    }

    #[tokio::test]
    async fn test_factory_counts_calls_and_fails_first() {
        let factory = MockBackendFactory::new(MockBehavior::Circle).failing_first(1);

        assert!(factory.create_backend().await.is_err());
        assert!(factory.create_backend().await.is_ok());
        assert_eq!(factory.calls(), 2);
    }
}
