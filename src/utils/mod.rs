//! Image pre- and post-processing helpers

pub mod mask;
pub mod preprocessing;

pub use mask::SegmentationMask;
pub use preprocessing::ImagePreprocessor;
