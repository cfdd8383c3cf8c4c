//! `BlazeFace` front-camera face detector.
//!
//! Weight layout follows hollance/BlazeFace-PyTorch with batch norm folded
//! into the convolution biases.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::collections::VecDeque;

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};

use super::sigmoid;

/// Side length of the square network input.
pub const INPUT_SIZE: usize = 128;

/// Detections overlapping a stronger one by more than this are dropped.
const IOU_THRESHOLD: f32 = 0.3;

/// Raw logits are clipped to this magnitude before the sigmoid.
const LOGIT_CLIP: f32 = 100.0;

/// `(in_channels, out_channels, stride)` per block of the 16x16 stage.
const STAGE_16: [(usize, usize, usize); 11] = [
    (24, 24, 1),
    (24, 28, 1),
    (28, 32, 2),
    (32, 36, 1),
    (36, 42, 1),
    (42, 48, 2),
    (48, 56, 1),
    (56, 64, 1),
    (64, 72, 1),
    (72, 80, 1),
    (80, 88, 1),
];

/// `(in_channels, out_channels, stride)` per block of the 8x8 stage.
const STAGE_8: [(usize, usize, usize); 5] = [
    (88, 96, 2),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
];

/// `(cells per side, anchors per cell)` for each detection head.
const ANCHOR_GRIDS: [(usize, usize); 2] = [(16, 2), (8, 6)];

/// A face found by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// `[x_min, y_min, x_max, y_max]`, normalized to `[0, 1]`.
    pub bbox: [f32; 4],
    /// Detection confidence in `[0, 1]`.
    pub score: f32,
}

impl Detection {
    /// Intersection over union with another detection.
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let [ax0, ay0, ax1, ay1] = self.bbox;
        let [bx0, by0, bx1, by1] = other.bbox;
        let overlap =
            (ax1.min(bx1) - ax0.max(bx0)).max(0.0) * (ay1.min(by1) - ay0.max(by0)).max(0.0);
        let union = (ax1 - ax0) * (ay1 - ay0) + (bx1 - bx0) * (by1 - by0) - overlap;
        if union > 0.0 {
            overlap / union
        } else {
            0.0
        }
    }
}

/// Depthwise-separable residual block.
struct BlazeBlock {
    depthwise: Conv2d,
    pointwise: Conv2d,
    extra_channels: usize,
    downsample: bool,
}

impl BlazeBlock {
    fn load(vb: &VarBuilder, (in_c, out_c, stride): (usize, usize, usize)) -> Result<Self> {
        let downsample = stride == 2;
        let depthwise = conv2d(
            in_c,
            in_c,
            3,
            Conv2dConfig {
                stride,
                // Downsampling blocks pad asymmetrically in `forward`
                padding: usize::from(!downsample),
                groups: in_c,
                ..Conv2dConfig::default()
            },
            vb.pp("depthwise"),
        )?;
        let pointwise = conv2d(in_c, out_c, 1, Conv2dConfig::default(), vb.pp("pointwise"))?;
        Ok(Self {
            depthwise,
            pointwise,
            extra_channels: out_c.saturating_sub(in_c),
            downsample,
        })
    }
}

impl Module for BlazeBlock {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (branch_in, shortcut) = if self.downsample {
            (
                x.pad_with_zeros(2, 0, 2)?.pad_with_zeros(3, 0, 2)?,
                x.max_pool2d(2)?,
            )
        } else {
            (x.clone(), x.clone())
        };

        let branch = self
            .pointwise
            .forward(&self.depthwise.forward(&branch_in)?.relu()?)?;
        let shortcut = if self.extra_channels > 0 {
            shortcut.pad_with_zeros(1, 0, self.extra_channels)?
        } else {
            shortcut
        };
        (branch + shortcut)?.relu()
    }
}

/// Classification and box regression for one anchor grid.
struct Head {
    classifier: Conv2d,
    regressor: Conv2d,
}

impl Head {
    fn load(vb: &VarBuilder, channels: usize, per_cell: usize, suffix: usize) -> Result<Self> {
        Ok(Self {
            classifier: conv2d(
                channels,
                per_cell,
                1,
                Conv2dConfig::default(),
                vb.pp(format!("classifier_{suffix}")),
            )?,
            regressor: conv2d(
                channels,
                per_cell * 16,
                1,
                Conv2dConfig::default(),
                vb.pp(format!("regressor_{suffix}")),
            )?,
        })
    }

    /// Per-anchor logits and 16 regression values, in anchor order.
    fn forward(&self, features: &Tensor) -> Result<(Vec<f32>, Vec<Vec<f32>>)> {
        let logits = self
            .classifier
            .forward(features)?
            .permute((0, 2, 3, 1))?
            .flatten_all()?
            .to_vec1::<f32>()?;
        let boxes = self
            .regressor
            .forward(features)?
            .permute((0, 2, 3, 1))?
            .reshape((logits.len(), 16))?
            .to_vec2::<f32>()?;
        Ok((logits, boxes))
    }
}

/// `BlazeFace` detector.
pub struct BlazeFace {
    stem: Conv2d,
    stage_16: Vec<BlazeBlock>,
    stage_8: Vec<BlazeBlock>,
    head_16: Head,
    head_8: Head,
    anchors: Vec<[f32; 2]>,
    device: Device,
}

impl BlazeFace {
    /// Builds the detector from its weights.
    ///
    /// # Errors
    ///
    /// Returns an error if a weight is missing or has the wrong shape.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let stem = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("conv0"),
        )?;

        let stage_16 = STAGE_16
            .iter()
            .enumerate()
            .map(|(i, &spec)| BlazeBlock::load(&vb.pp(format!("backbone1.{i}")), spec))
            .collect::<Result<Vec<_>>>()
            .context("Failed to load first backbone stage")?;
        let stage_8 = STAGE_8
            .iter()
            .enumerate()
            .map(|(i, &spec)| BlazeBlock::load(&vb.pp(format!("backbone2.{i}")), spec))
            .collect::<Result<Vec<_>>>()
            .context("Failed to load second backbone stage")?;

        Ok(Self {
            stem,
            stage_16,
            stage_8,
            head_16: Head::load(&vb, 88, ANCHOR_GRIDS[0].1, 16)?,
            head_8: Head::load(&vb, 96, ANCHOR_GRIDS[1].1, 8)?,
            anchors: anchor_centers(),
            device: vb.device().clone(),
        })
    }

    /// Detects faces scoring at least `min_confidence`, strongest first.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect(
        &self,
        image: &image::DynamicImage,
        min_confidence: f32,
    ) -> Result<Vec<Detection>> {
        let input = self.preprocess(image)?;

        let x = input.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let mut x = self.stem.forward(&x)?.relu()?;
        for block in &self.stage_16 {
            x = block.forward(&x)?;
        }
        let (mut logits, mut boxes) = self.head_16.forward(&x)?;
        for block in &self.stage_8 {
            x = block.forward(&x)?;
        }
        let (logits_8, boxes_8) = self.head_8.forward(&x)?;
        logits.extend(logits_8);
        boxes.extend(boxes_8);

        let candidates = decode(&self.anchors, &logits, &boxes, min_confidence);
        Ok(non_max_suppression(candidates))
    }

    /// Resizes to the input size and scales channels to `[-1, 1]`, NCHW.
    fn preprocess(&self, image: &image::DynamicImage) -> Result<Tensor> {
        let side = INPUT_SIZE as u32;
        let rgb = image
            .resize_exact(side, side, image::imageops::FilterType::Triangle)
            .to_rgb8();
        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 127.5 - 1.0)
            .collect();
        Tensor::from_vec(data, (INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)
            .context("Failed to build detector input")
    }
}

/// Anchor centers for every grid cell, in head output order.
fn anchor_centers() -> Vec<[f32; 2]> {
    ANCHOR_GRIDS
        .iter()
        .flat_map(|&(cells, per_cell)| {
            let step = 1.0 / cells as f32;
            (0..cells).flat_map(move |y| {
                (0..cells).flat_map(move |x| {
                    std::iter::repeat_n([(x as f32 + 0.5) * step, (y as f32 + 0.5) * step], per_cell)
                })
            })
        })
        .collect()
}

/// Turns raw head outputs into normalized boxes above the confidence floor.
fn decode(
    anchors: &[[f32; 2]],
    logits: &[f32],
    boxes: &[Vec<f32>],
    min_confidence: f32,
) -> Vec<Detection> {
    let scale = INPUT_SIZE as f32;
    anchors
        .iter()
        .zip(logits)
        .zip(boxes)
        .filter_map(|((&[ax, ay], &logit), raw)| {
            let score = sigmoid(logit.clamp(-LOGIT_CLIP, LOGIT_CLIP));
            if score < min_confidence || raw.len() < 4 {
                return None;
            }
            let cx = ax + raw[0] / scale;
            let cy = ay + raw[1] / scale;
            let (half_w, half_h) = (raw[2] / scale / 2.0, raw[3] / scale / 2.0);
            Some(Detection {
                bbox: [
                    (cx - half_w).clamp(0.0, 1.0),
                    (cy - half_h).clamp(0.0, 1.0),
                    (cx + half_w).clamp(0.0, 1.0),
                    (cy + half_h).clamp(0.0, 1.0),
                ],
                score,
            })
        })
        .collect()
}

/// Greedy suppression of overlapping detections, strongest first.
fn non_max_suppression(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut pending: VecDeque<Detection> = detections.into();
    let mut kept = Vec::new();

    while let Some(best) = pending.pop_front() {
        pending.retain(|other| best.iou(other) < IOU_THRESHOLD);
        kept.push(best);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], score: f32) -> Detection {
        Detection { bbox, score }
    }

    #[test]
    fn test_iou() {
        let a = det([0.0, 0.0, 0.5, 0.5], 1.0);
        assert!(a.iou(&det([0.6, 0.6, 1.0, 1.0], 1.0)).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        // 0.0625 / (0.25 + 0.25 - 0.0625)
        let partial = a.iou(&det([0.25, 0.25, 0.75, 0.75], 1.0));
        assert!((partial - 0.0625 / 0.4375).abs() < 1e-6);
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        let point = det([0.5, 0.5, 0.5, 0.5], 1.0);
        assert!(point.iou(&point).abs() < 1e-6);
    }

    #[test]
    fn test_anchor_layout() {
        let anchors = anchor_centers();
        assert_eq!(anchors.len(), 16 * 16 * 2 + 8 * 8 * 6);
        assert_eq!(anchors[0], [0.5 / 16.0, 0.5 / 16.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[2], [1.5 / 16.0, 0.5 / 16.0]);
        assert_eq!(anchors[512], [0.5 / 8.0, 0.5 / 8.0]);
        assert_eq!(anchors[anchors.len() - 1], [7.5 / 8.0, 7.5 / 8.0]);
    }

    #[test]
    fn test_nms_keeps_strongest_of_overlaps() {
        let kept = non_max_suppression(vec![
            det([0.1, 0.1, 0.5, 0.5], 0.8),
            det([0.12, 0.1, 0.52, 0.5], 0.95),
            det([0.6, 0.6, 0.9, 0.9], 0.9),
        ]);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.95).abs() < 1e-6);
        assert!((kept[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_filters_and_centers() {
        let anchors = [[0.5, 0.5], [0.25, 0.25]];
        let logits = [5.0, -5.0];
        let boxes = vec![vec![0.0, 0.0, 64.0, 32.0], vec![0.0; 16]];
        let found = decode(&anchors, &logits, &boxes, 0.75);
        assert_eq!(found.len(), 1);
        let [x0, y0, x1, y1] = found[0].bbox;
        assert!((x0 - 0.25).abs() < 1e-6 && (x1 - 0.75).abs() < 1e-6);
        assert!((y0 - 0.375).abs() < 1e-6 && (y1 - 0.625).abs() < 1e-6);
    }
}
