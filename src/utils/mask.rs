//! Segmentation mask generation and compositing

use crate::error::{BgRemovalError, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use ndarray::{Array4, Axis};

/// Grayscale foreground mask, 255 = fully opaque
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    image: GrayImage,
}

impl SegmentationMask {
    /// Build a mask from a model prediction
    ///
    /// Uses channel 0 of the first batch entry, min-max normalized to
    /// `0..=255`. A flat prediction yields an all-zero mask.
    ///
    /// # Errors
    /// - Empty prediction tensor
    pub fn from_prediction(prediction: &Array4<f32>) -> Result<Self> {
        let (n, c, h, w) = prediction.dim();
        if n == 0 || c == 0 || h == 0 || w == 0 {
            return Err(BgRemovalError::NoOutput);
        }

        let saliency = prediction.index_axis(Axis(0), 0);
        let saliency = saliency.index_axis(Axis(0), 0);

        let (min, max) = saliency
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        let pixels: Vec<u8> = if range > f32::EPSILON && range.is_finite() {
            saliency
                .iter()
                .map(|&v| (((v - min) / range).clamp(0.0, 1.0) * 255.0) as u8)
                .collect()
        } else {
            vec![0; h * w]
        };

        let image = GrayImage::from_raw(w as u32, h as u32, pixels)
            .ok_or_else(|| BgRemovalError::processing("Mask buffer does not match its size"))?;

        Ok(Self { image })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Resize the mask to the given dimensions with Lanczos3
    #[must_use]
    pub fn resize(&self, width: u32, height: u32) -> Self {
        if self.image.dimensions() == (width, height) {
            return self.clone();
        }
        Self {
            image: imageops::resize(&self.image, width, height, FilterType::Lanczos3),
        }
    }

    /// Composite `source` over transparent black using this mask
    ///
    /// Every channel, alpha included, is scaled by `mask / 255`.
    ///
    /// # Errors
    /// - Mask and image dimensions differ
    pub fn apply(&self, source: &RgbaImage) -> Result<RgbaImage> {
        if source.dimensions() != self.image.dimensions() {
            return Err(BgRemovalError::processing(format!(
                "Mask is {:?} but image is {:?}",
                self.image.dimensions(),
                source.dimensions()
            )));
        }

        let mut output = source.clone();
        for (pixel, alpha) in output.pixels_mut().zip(self.image.pixels()) {
            let weight = u16::from(alpha.0[0]);
            for channel in &mut pixel.0 {
                *channel = ((u16::from(*channel) * weight + 127) / 255) as u8;
            }
        }

        Ok(output)
    }
}
