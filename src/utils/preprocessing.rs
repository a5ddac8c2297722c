//! Image to tensor conversion

use crate::error::{BgRemovalError, Result};
use crate::models::PreprocessingConfig;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;

/// Lower bound for the per-image scale divisor
const MIN_SCALE: f32 = 1e-6;

/// Model input preparation
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the NCHW input tensor for a model
    ///
    /// The image is stretched to the model's input size (aspect ratio is not
    /// preserved), scaled so its brightest channel value is 1.0, then
    /// normalized per channel with the model's mean and std.
    ///
    /// # Errors
    /// - Zero target size in the preprocessing config
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [width, height] = preprocessing_config.target_size;
        if width == 0 || height == 0 {
            return Err(BgRemovalError::processing(
                "Model input size must be non-zero",
            ));
        }

        let rgb_image = image.to_rgb8();
        let resized = imageops::resize(&rgb_image, width, height, FilterType::Lanczos3);

        Ok(Self::image_to_tensor(&resized, preprocessing_config))
    }

    fn image_to_tensor(image: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let max_value = image
            .as_raw()
            .iter()
            .copied()
            .max()
            .map_or(0.0, |v| f32::from(v) / 255.0);
        let scale = max_value.max(MIN_SCALE);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        #[allow(clippy::indexing_slicing)]
        // tensor is allocated with the image's dimensions
        for (x, y, pixel) in image.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0 / scale;
                tensor[[0, c, y, x]] = (value - mean[c]) / std[c];
            }
        }

        tensor
    }
}
