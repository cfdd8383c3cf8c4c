//! Sharpness analysis.
//!
//! Scores focus quality with the variance of a 4-connected Laplacian over the
//! grayscale image. Edges produce large responses; flat or defocused regions
//! produce none.

use image::GrayImage;

use crate::domain::{AnalysisError, BlurSeverity, ImageBuffer, SharpnessMetric};

/// Configuration for sharpness scoring.
#[derive(Debug, Clone)]
pub struct SharpnessConfig {
    /// Laplacian variance is divided by this to get the 0-100 score.
    /// Empirically chosen.
    pub variance_divisor: f64,
}

impl Default for SharpnessConfig {
    fn default() -> Self {
        Self {
            variance_divisor: 10.0,
        }
    }
}

/// Laplacian-variance sharpness analyzer.
#[derive(Debug, Clone, Default)]
pub struct SharpnessAnalyzer {
    config: SharpnessConfig,
}

impl SharpnessAnalyzer {
    /// Creates a sharpness analyzer with the given configuration.
    #[must_use]
    pub const fn new(config: SharpnessConfig) -> Self {
        Self { config }
    }

    /// Decodes the buffer and scores its sharpness.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Decode`] if the buffer cannot be decoded.
    pub fn analyze(&self, buffer: &ImageBuffer) -> Result<SharpnessMetric, AnalysisError> {
        let gray = buffer.decode()?.into_luma8();
        Ok(self.score(&gray))
    }

    /// Scores an already decoded grayscale image.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn score(&self, gray: &GrayImage) -> SharpnessMetric {
        let variance = laplacian_variance(gray);
        // Non-negative and capped at 100 before the cast
        let score = (variance / self.config.variance_divisor).round().min(100.0) as u8;
        let severity = BlurSeverity::from_score(score);
        SharpnessMetric {
            score,
            is_blurry: severity.is_blurry(),
            severity,
        }
    }
}

/// Mean squared 4-connected Laplacian response over interior pixels.
///
/// Returns 0.0 for images without interior pixels (either side < 3).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let w = width as usize;
    let data = gray.as_raw();
    let mut sum_sq: u64 = 0;

    for y in 1..(height as usize - 1) {
        let row = y * w;
        for x in 1..(w - 1) {
            let i = row + x;
            let center = 4 * i32::from(data[i]);
            let neighbours = i32::from(data[i - w])
                + i32::from(data[i + w])
                + i32::from(data[i - 1])
                + i32::from(data[i + 1]);
            let response = u64::from((center - neighbours).unsigned_abs());
            sum_sq += response * response;
        }
    }

    let interior = u64::from(width - 2) * u64::from(height - 2);
    sum_sq as f64 / interior as f64
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_default_config() {
        let config = SharpnessConfig::default();
        assert!((config.variance_divisor - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_uniform_image_has_zero_variance() {
        let img = GrayImage::from_fn(300, 300, |_, _| Luma([128u8]));
        assert!(laplacian_variance(&img).abs() < f64::EPSILON);

        let metric = SharpnessAnalyzer::default().score(&img);
        assert_eq!(metric.score, 0);
        assert!(metric.is_blurry);
        assert_eq!(metric.severity, BlurSeverity::VeryBlurry);
    }

    #[test]
    fn test_single_bright_pixel() {
        // One 255 pixel in a 5x5 black field: centre response 1020, four
        // neighbours respond 255 each, interior is 3x3 = 9 pixels
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, Luma([255]));
        let expected = (1020.0f64.powi(2) + 4.0 * 255.0f64.powi(2)) / 9.0;
        assert!((laplacian_variance(&img) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_border_pixels_are_ignored() {
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(0, 0, Luma([255]));
        img.put_pixel(4, 4, Luma([255]));
        assert!(laplacian_variance(&img).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tiny_images() {
        assert!(laplacian_variance(&GrayImage::new(2, 2)).abs() < f64::EPSILON);
        assert!(laplacian_variance(&GrayImage::new(1, 100)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_checkerboard_is_sharp() {
        let img = GrayImage::from_fn(256, 256, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let metric = SharpnessAnalyzer::default().score(&img);
        assert_eq!(metric.score, 100);
        assert!(!metric.is_blurry);
        assert_eq!(metric.severity, BlurSeverity::Sharp);
    }

    #[test]
    fn test_gentle_gradient_is_blurry() {
        // Linear ramps have zero second derivative
        let img = GrayImage::from_fn(256, 256, |x, _| Luma([x as u8]));
        let metric = SharpnessAnalyzer::default().score(&img);
        assert_eq!(metric.score, 0);
        assert!(metric.is_blurry);
    }

    #[test]
    fn test_threshold_consistency() {
        let analyzer = SharpnessAnalyzer::default();
        for step in [1u32, 2, 3, 4, 6, 8, 16, 32] {
            let img = GrayImage::from_fn(64, 64, |x, y| {
                Luma([if (x / step + y / step) % 2 == 0 { 90 } else { 70 }])
            });
            let m = analyzer.score(&img);
            assert!(m.score <= 100);
            assert_eq!(m.severity == BlurSeverity::Sharp, m.score >= 50);
            assert_eq!(m.is_blurry, m.score < 30);
        }
    }

    #[test]
    fn test_decode_error_propagates() {
        let buffer = ImageBuffer::from(b"garbage".as_slice());
        let err = SharpnessAnalyzer::default()
            .analyze(&buffer)
            .expect_err("decode should fail");
        assert!(matches!(err, AnalysisError::Decode(_)));
    }
}
