//! Five-class facial expression CNN.
//!
//! Classifies a 48x48 grayscale face crop into happy, neutral, sad, angry
//! and surprised.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use anyhow::{bail, Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};

use super::softmax;
use crate::domain::ExpressionWeights;

/// Side length of the square face crop.
pub const FACE_SIZE: usize = 48;

/// Output classes, in logit order.
pub const LABELS: [&str; 5] = ["happy", "neutral", "sad", "angry", "surprised"];

/// Fraction of the face box added on every side before cropping.
const CROP_MARGIN: f32 = 0.1;

/// Channel widths of the three conv stages.
const CHANNELS: [usize; 4] = [1, 32, 64, 128];

/// Flattened features after three 2x2 pools: 48 -> 24 -> 12 -> 6.
const FLAT_FEATURES: usize = 128 * (FACE_SIZE / 8) * (FACE_SIZE / 8);

/// Expression classifier over a single face crop.
pub struct ExpressionNet {
    convs: Vec<Conv2d>,
    hidden: Linear,
    output: Linear,
    device: Device,
}

impl ExpressionNet {
    /// Builds the network from its weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let same = Conv2dConfig {
            padding: 1,
            ..Conv2dConfig::default()
        };
        let convs = CHANNELS
            .windows(2)
            .enumerate()
            .map(|(i, io)| conv2d(io[0], io[1], 3, same, vb.pp(format!("conv{}", i + 1))))
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self {
            convs,
            hidden: linear(FLAT_FEATURES, 256, vb.pp("fc1"))?,
            output: linear(256, LABELS.len(), vb.pp("fc2"))?,
            device: vb.device().clone(),
        })
    }

    /// Classifies the face inside `bbox` (normalized corners).
    ///
    /// # Errors
    ///
    /// Returns an error if the crop is empty or inference fails.
    pub fn classify(
        &self,
        image: &image::DynamicImage,
        bbox: &[f32; 4],
    ) -> Result<ExpressionWeights> {
        let input = self.preprocess(image, bbox)?;
        let logits = self.forward(&input)?.flatten_all()?.to_vec1::<f32>()?;
        weights_from_probabilities(&softmax(&logits))
    }

    /// Crops, resizes and converts to a `(1, 1, 48, 48)` tensor in `[0, 1]`.
    fn preprocess(&self, image: &image::DynamicImage, bbox: &[f32; 4]) -> Result<Tensor> {
        let (x, y, w, h) = crop_rect(image.width(), image.height(), bbox)
            .context("Face box does not intersect the image")?;
        let side = FACE_SIZE as u32;
        let face = image
            .crop_imm(x, y, w, h)
            .resize_exact(side, side, image::imageops::FilterType::Triangle)
            .to_luma8();
        let data: Vec<f32> = face
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect();
        Tensor::from_vec(data, (1, 1, FACE_SIZE, FACE_SIZE), &self.device)
            .context("Failed to build face tensor")
    }
}

impl Module for ExpressionNet {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = x.clone();
        for conv in &self.convs {
            x = conv.forward(&x)?.relu()?.max_pool2d(2)?;
        }
        let x = self.hidden.forward(&x.flatten_from(1)?)?.relu()?;
        self.output.forward(&x)
    }
}

/// Pixel rectangle `(x, y, width, height)` of the face box plus margin,
/// clipped to the image. `None` if nothing is left.
fn crop_rect(width: u32, height: u32, bbox: &[f32; 4]) -> Option<(u32, u32, u32, u32)> {
    let [x0, y0, x1, y1] = *bbox;
    let (mx, my) = ((x1 - x0) * CROP_MARGIN, (y1 - y0) * CROP_MARGIN);
    let (w, h) = (width as f32, height as f32);

    let left = ((x0 - mx).clamp(0.0, 1.0) * w).round() as u32;
    let top = ((y0 - my).clamp(0.0, 1.0) * h).round() as u32;
    let right = ((x1 + mx).clamp(0.0, 1.0) * w).round() as u32;
    let bottom = ((y1 + my).clamp(0.0, 1.0) * h).round() as u32;

    let (right, bottom) = (right.min(width), bottom.min(height));
    (right > left && bottom > top).then(|| (left, top, right - left, bottom - top))
}

fn weights_from_probabilities(probs: &[f32]) -> Result<ExpressionWeights> {
    let &[happy, neutral, sad, angry, surprised] = probs else {
        bail!("Expected {} expression scores, got {}", LABELS.len(), probs.len());
    };
    Ok(ExpressionWeights {
        happy,
        neutral,
        sad,
        angry,
        surprised,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_feature_count() {
        assert_eq!(FLAT_FEATURES, 4608);
    }

    #[test]
    fn test_crop_rect_adds_margin() {
        // 0.2..0.6 box on 100px: margin 4px each side
        let rect = crop_rect(100, 100, &[0.2, 0.2, 0.6, 0.6]).expect("rect");
        assert_eq!(rect, (16, 16, 48, 48));
    }

    #[test]
    fn test_crop_rect_clips_to_image() {
        let (x, y, w, h) = crop_rect(200, 100, &[0.0, 0.0, 1.0, 1.0]).expect("rect");
        assert_eq!((x, y), (0, 0));
        assert_eq!((w, h), (200, 100));
    }

    #[test]
    fn test_crop_rect_empty() {
        assert!(crop_rect(100, 100, &[0.5, 0.5, 0.5, 0.5]).is_none());
        assert!(crop_rect(0, 0, &[0.1, 0.1, 0.9, 0.9]).is_none());
    }

    #[test]
    fn test_weights_from_probabilities() {
        let w = weights_from_probabilities(&[0.6, 0.2, 0.1, 0.05, 0.05]).expect("weights");
        assert!((w.happy - 0.6).abs() < 1e-6);
        assert!((w.surprised - 0.05).abs() < 1e-6);
        assert!(weights_from_probabilities(&[1.0]).is_err());
    }
}
