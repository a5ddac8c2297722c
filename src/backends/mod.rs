//! Inference backends
//!
//! - ONNX Runtime backend (hardware execution providers)
//! - Tract backend (pure Rust, CPU only)
//! - Mock backend (no model, for tests and benchmarks)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::{MockBackend, MockBackendFactory, MockBehavior};

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
