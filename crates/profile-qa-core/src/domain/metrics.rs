//! Per-photo quality metrics.
//!
//! Every score is an integer in `0..=100`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Focus quality derived from Laplacian variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharpnessMetric {
    /// Sharpness score (0-100).
    pub score: u8,
    /// True when the score is below the blur threshold.
    pub is_blurry: bool,
    /// Bucketed severity.
    pub severity: BlurSeverity,
}

/// How blurry an image is.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlurSeverity {
    /// Score 50 and above.
    Sharp,
    /// Score 30 to 49.
    SlightBlur,
    /// Score 15 to 29.
    Blurry,
    /// Score below 15.
    VeryBlurry,
}

impl BlurSeverity {
    /// Buckets a sharpness score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            50.. => Self::Sharp,
            30..=49 => Self::SlightBlur,
            15..=29 => Self::Blurry,
            _ => Self::VeryBlurry,
        }
    }

    /// True for [`Self::Blurry`] and [`Self::VeryBlurry`] (score below 30).
    #[must_use]
    pub const fn is_blurry(self) -> bool {
        matches!(self, Self::Blurry | Self::VeryBlurry)
    }

    /// Wire name, as used in warnings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sharp => "sharp",
            Self::SlightBlur => "slight-blur",
            Self::Blurry => "blurry",
            Self::VeryBlurry => "very-blurry",
        }
    }
}

impl fmt::Display for BlurSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brightness and contrast assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightingMetric {
    /// Lighting score (0-100).
    pub score: u8,
    /// True when the score is at least 50.
    pub is_good_lighting: bool,
    /// Normalized mean luma (0-100).
    pub brightness: u8,
    /// Normalized luma standard deviation (0-100).
    pub contrast: u8,
    /// Human-readable problems, in evaluation order.
    pub issues: Vec<String>,
}

/// Facial-expression signal for the most prominent face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionMetric {
    /// Smile score (0-100).
    pub score: u8,
    /// True when the smile score is at least 30.
    pub has_smile: bool,
    /// Bucketed smile confidence.
    pub confidence: SmileConfidence,
    /// Whether a face was found.
    pub face_detected: bool,
    /// Expression weights scaled to 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expressions: Option<ExpressionScores>,
}

/// Smile confidence bucket.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmileConfidence {
    /// No face to judge.
    NoFace,
    /// Smile score below 30.
    Neutral,
    /// Smile score 30 to 59.
    SlightSmile,
    /// Smile score 60 and above.
    ClearSmile,
}

impl SmileConfidence {
    /// Buckets a smile score of a detected face.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            60.. => Self::ClearSmile,
            30..=59 => Self::SlightSmile,
            _ => Self::Neutral,
        }
    }
}

/// Raw classifier probabilities for the five tracked expressions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionWeights {
    /// Happiness.
    pub happy: f32,
    /// Neutral face.
    pub neutral: f32,
    /// Sadness.
    pub sad: f32,
    /// Anger.
    pub angry: f32,
    /// Surprise.
    pub surprised: f32,
}

impl ExpressionWeights {
    /// Returns a copy with every weight clamped into `[0, 1]`; NaN becomes 0.
    #[must_use]
    pub fn clamped(self) -> Self {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        Self {
            happy: unit(self.happy),
            neutral: unit(self.neutral),
            sad: unit(self.sad),
            angry: unit(self.angry),
            surprised: unit(self.surprised),
        }
    }
}

/// Expression weights scaled to integer percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionScores {
    /// Happiness.
    pub happy: u8,
    /// Neutral face.
    pub neutral: u8,
    /// Sadness.
    pub sad: u8,
    /// Anger.
    pub angry: u8,
    /// Surprise.
    pub surprised: u8,
}

impl From<ExpressionWeights> for ExpressionScores {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(weights: ExpressionWeights) -> Self {
        let w = weights.clamped();
        // Clamped to [0, 1] so the product always fits in 0..=100
        let pct = |v: f32| (f64::from(v) * 100.0).round() as u8;
        Self {
            happy: pct(w.happy),
            neutral: pct(w.neutral),
            sad: pct(w.sad),
            angry: pct(w.angry),
            surprised: pct(w.surprised),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blur_severity_boundaries() {
        assert_eq!(BlurSeverity::from_score(100), BlurSeverity::Sharp);
        assert_eq!(BlurSeverity::from_score(50), BlurSeverity::Sharp);
        assert_eq!(BlurSeverity::from_score(49), BlurSeverity::SlightBlur);
        assert_eq!(BlurSeverity::from_score(30), BlurSeverity::SlightBlur);
        assert_eq!(BlurSeverity::from_score(29), BlurSeverity::Blurry);
        assert_eq!(BlurSeverity::from_score(15), BlurSeverity::Blurry);
        assert_eq!(BlurSeverity::from_score(14), BlurSeverity::VeryBlurry);
        assert_eq!(BlurSeverity::from_score(0), BlurSeverity::VeryBlurry);
    }

    #[test]
    fn test_blurry_flag_follows_severity() {
        for score in 0..=100 {
            let severity = BlurSeverity::from_score(score);
            assert_eq!(severity.is_blurry(), score < 30, "score {score}");
            assert_eq!(
                severity.is_blurry(),
                !matches!(severity, BlurSeverity::Sharp | BlurSeverity::SlightBlur)
            );
        }
    }

    #[test]
    fn test_smile_confidence_boundaries() {
        assert_eq!(SmileConfidence::from_score(60), SmileConfidence::ClearSmile);
        assert_eq!(SmileConfidence::from_score(59), SmileConfidence::SlightSmile);
        assert_eq!(SmileConfidence::from_score(30), SmileConfidence::SlightSmile);
        assert_eq!(SmileConfidence::from_score(29), SmileConfidence::Neutral);
    }

    #[test]
    fn test_severity_serializes_kebab_case() {
        let json = serde_json::to_string(&BlurSeverity::VeryBlurry).unwrap_or_default();
        assert_eq!(json, "\"very-blurry\"");
        assert_eq!(BlurSeverity::SlightBlur.to_string(), "slight-blur");
    }

    #[test]
    fn test_expression_scores_from_weights() {
        let scores = ExpressionScores::from(ExpressionWeights {
            happy: 0.876,
            neutral: 0.1,
            sad: -0.2,
            angry: 1.7,
            surprised: f32::NAN,
        });
        assert_eq!(scores.happy, 88);
        assert_eq!(scores.neutral, 10);
        assert_eq!(scores.sad, 0);
        assert_eq!(scores.angry, 100);
        assert_eq!(scores.surprised, 0);
    }
}
