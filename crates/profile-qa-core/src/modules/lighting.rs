//! Lighting analysis.
//!
//! Samples pixels on a fixed grid, measures perceptual brightness (BT.709
//! luma) and its spread, and turns both into a penalised 0-100 score.

use image::RgbImage;

use crate::domain::{AnalysisError, ImageBuffer, LightingMetric};

/// Issue reported when mean brightness is below `dark_below`.
pub const ISSUE_TOO_DARK: &str = "Image is too dark";
/// Issue reported when mean brightness is above `bright_above`.
pub const ISSUE_OVEREXPOSED: &str = "Image is overexposed";
/// Issue reported when contrast is below `flat_below`.
pub const ISSUE_LOW_CONTRAST: &str = "Low contrast - image appears flat";
/// Issue reported when contrast is above `harsh_above`.
pub const ISSUE_HIGH_CONTRAST: &str = "Very high contrast - may indicate harsh lighting";

/// BT.709 luma weights for red, green and blue.
const LUMA_WEIGHTS: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Configuration for lighting analysis.
#[derive(Debug, Clone)]
pub struct LightingConfig {
    /// Sample every n-th pixel on both axes.
    pub sample_stride: u32,
    /// Luma standard deviation that maps to contrast 100. Empirically chosen
    /// for typical portrait contrast.
    pub contrast_reference: f64,
    /// Brightness below this is penalised one point per step.
    pub dark_below: u8,
    /// Brightness above this is penalised two points per step.
    pub bright_above: u8,
    /// Contrast below this is penalised one point per step.
    pub flat_below: u8,
    /// Contrast above this is penalised half a point per step.
    pub harsh_above: u8,
    /// Scores at or above this count as good lighting.
    pub good_threshold: u8,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            sample_stride: 4,
            contrast_reference: 70.0,
            dark_below: 40,
            bright_above: 85,
            flat_below: 25,
            harsh_above: 80,
            good_threshold: 50,
        }
    }
}

/// Brightness statistics over the sampled pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaStats {
    /// Mean luma (0-255).
    pub mean: f64,
    /// Population standard deviation of luma.
    pub std_dev: f64,
    /// Number of sampled pixels.
    pub samples: u64,
}

impl LumaStats {
    /// Computes luma statistics over every `stride`-th pixel in both axes.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn sample(image: &RgbImage, stride: u32) -> Self {
        let stride = stride.max(1) as usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        let mut samples = 0u64;

        for y in (0..image.height()).step_by(stride) {
            for x in (0..image.width()).step_by(stride) {
                let b = luma(image.get_pixel(x, y).0);
                sum += b;
                sum_sq += b * b;
                samples += 1;
            }
        }

        if samples == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                samples,
            };
        }

        let n = samples as f64;
        let mean = sum / n;
        // Guard against tiny negative values from rounding
        let variance = (sum_sq / n - mean * mean).max(0.0);
        Self {
            mean,
            std_dev: variance.sqrt(),
            samples,
        }
    }
}

/// Perceptual brightness of one pixel.
fn luma([r, g, b]: [u8; 3]) -> f64 {
    LUMA_WEIGHTS[0] * f64::from(r) + LUMA_WEIGHTS[1] * f64::from(g) + LUMA_WEIGHTS[2] * f64::from(b)
}

/// Strided-sample lighting analyzer.
#[derive(Debug, Clone, Default)]
pub struct LightingAnalyzer {
    config: LightingConfig,
}

impl LightingAnalyzer {
    /// Creates a lighting analyzer with the given configuration.
    #[must_use]
    pub const fn new(config: LightingConfig) -> Self {
        Self { config }
    }

    /// Decodes the buffer and scores its lighting.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Decode`] if the buffer cannot be decoded.
    pub fn analyze(&self, buffer: &ImageBuffer) -> Result<LightingMetric, AnalysisError> {
        let rgb = buffer.decode()?.into_rgb8();
        Ok(self.score(&rgb))
    }

    /// Scores an already decoded RGB image.
    #[must_use]
    pub fn score(&self, image: &RgbImage) -> LightingMetric {
        let stats = LumaStats::sample(image, self.config.sample_stride);
        self.score_stats(&stats)
    }

    /// Turns luma statistics into a lighting metric.
    #[must_use]
    pub fn score_stats(&self, stats: &LumaStats) -> LightingMetric {
        let cfg = &self.config;
        let brightness = to_percent(stats.mean / 255.0 * 100.0);
        let contrast = to_percent(stats.std_dev / cfg.contrast_reference * 100.0);

        let mut score = 100.0f64;
        let mut issues = Vec::new();

        if brightness < cfg.dark_below {
            score -= f64::from(cfg.dark_below - brightness);
            issues.push(ISSUE_TOO_DARK.to_string());
        }
        if brightness > cfg.bright_above {
            score -= f64::from(brightness - cfg.bright_above) * 2.0;
            issues.push(ISSUE_OVEREXPOSED.to_string());
        }
        if contrast < cfg.flat_below {
            score -= f64::from(cfg.flat_below - contrast);
            issues.push(ISSUE_LOW_CONTRAST.to_string());
        }
        if contrast > cfg.harsh_above {
            score -= f64::from(contrast - cfg.harsh_above) / 2.0;
            issues.push(ISSUE_HIGH_CONTRAST.to_string());
        }

        let score = to_percent(score);
        LightingMetric {
            score,
            is_good_lighting: score >= cfg.good_threshold,
            brightness,
            contrast,
            issues,
        }
    }
}

/// Rounds and clamps a value into `0..=100`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use image::Rgb;

    fn uniform(value: u8) -> RgbImage {
        RgbImage::from_fn(300, 300, |_, _| Rgb([value, value, value]))
    }

    #[test]
    fn test_default_config() {
        let config = LightingConfig::default();
        assert_eq!(config.sample_stride, 4);
        assert!((config.contrast_reference - 70.0).abs() < f64::EPSILON);
        assert_eq!(config.good_threshold, 50);
    }

    #[test]
    fn test_sampling_uses_stride() {
        let stats = LumaStats::sample(&uniform(10), 4);
        // ceil(300 / 4) = 75 per axis
        assert_eq!(stats.samples, 75 * 75);

        let stats = LumaStats::sample(&RgbImage::new(9, 5), 4);
        assert_eq!(stats.samples, 3 * 2);
    }

    #[test]
    fn test_luma_weights() {
        assert!((luma([255, 255, 255]) - 255.0).abs() < 1e-9);
        assert!((luma([255, 0, 0]) - 54.213).abs() < 1e-9);
        assert!((luma([0, 255, 0]) - 182.376).abs() < 1e-9);
        assert!((luma([0, 0, 255]) - 18.411).abs() < 1e-9);
    }

    #[test]
    fn test_mid_gray_is_flat() {
        let metric = LightingAnalyzer::default().score(&uniform(128));
        assert_eq!(metric.brightness, 50);
        assert_eq!(metric.contrast, 0);
        assert_eq!(metric.issues, vec![ISSUE_LOW_CONTRAST.to_string()]);
        assert_eq!(metric.score, 75);
        assert!(metric.is_good_lighting);
    }

    #[test]
    fn test_black_image_is_dark_and_flat() {
        let metric = LightingAnalyzer::default().score(&uniform(0));
        assert_eq!(metric.brightness, 0);
        assert_eq!(
            metric.issues,
            vec![ISSUE_TOO_DARK.to_string(), ISSUE_LOW_CONTRAST.to_string()]
        );
        // 100 - 40 - 25
        assert_eq!(metric.score, 35);
        assert!(!metric.is_good_lighting);
    }

    #[test]
    fn test_white_image_is_overexposed() {
        let metric = LightingAnalyzer::default().score(&uniform(255));
        assert_eq!(metric.brightness, 100);
        assert_eq!(
            metric.issues,
            vec![ISSUE_OVEREXPOSED.to_string(), ISSUE_LOW_CONTRAST.to_string()]
        );
        // 100 - 30 - 25
        assert_eq!(metric.score, 45);
        assert!(!metric.is_good_lighting);
    }

    #[test]
    fn test_harsh_contrast() {
        // Alternating 4px columns of black and white: every sample hits a
        // column start, so samples alternate 0 and 255
        let img = RgbImage::from_fn(400, 400, |x, _| {
            if (x / 4) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let metric = LightingAnalyzer::default().score(&img);
        assert_eq!(metric.brightness, 50);
        assert_eq!(metric.contrast, 100);
        assert_eq!(metric.issues, vec![ISSUE_HIGH_CONTRAST.to_string()]);
        assert_eq!(metric.score, 90);
    }

    #[test]
    fn test_fractional_penalty_rounds() {
        let analyzer = LightingAnalyzer::default();
        // contrast 81 -> penalty 0.5, 100 - 0.5 rounds away from zero to 100
        let metric = analyzer.score_stats(&LumaStats {
            mean: 127.5,
            std_dev: 56.7,
            samples: 1,
        });
        assert_eq!(metric.contrast, 81);
        assert_eq!(metric.score, 100);
    }

    #[test]
    fn test_well_lit_gradient_has_no_issues() {
        let img = RgbImage::from_fn(300, 300, |x, _| {
            let v = 30 + (x * 180 / 300) as u8;
            Rgb([v, v, v])
        });
        let metric = LightingAnalyzer::default().score(&img);
        assert!(metric.issues.is_empty(), "issues: {:?}", metric.issues);
        assert_eq!(metric.score, 100);
        assert!(metric.is_good_lighting);
    }

    #[test]
    fn test_empty_image() {
        let metric = LightingAnalyzer::default().score(&RgbImage::new(0, 0));
        assert_eq!(metric.brightness, 0);
        assert!(metric.score <= 100);
    }

    #[test]
    fn test_decode_error_propagates() {
        let err = LightingAnalyzer::default()
            .analyze(&ImageBuffer::from(b"nope".as_slice()))
            .expect_err("decode should fail");
        assert!(matches!(err, AnalysisError::Decode(_)));
    }
}
