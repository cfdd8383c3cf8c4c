//! Composite scoring: blends the three metrics into one report.

use crate::domain::{ExpressionMetric, LightingMetric, QualityReport, SharpnessMetric};

/// Warning emitted when no face was detected.
pub const WARNING_NO_FACE: &str = "No face detected in image";
/// Warning emitted when a face was detected without a smile.
pub const WARNING_NO_SMILE: &str =
    "Consider using a photo with a smile - profiles with smiling photos tend to perform better";

/// Relative weights of the metrics in the overall score, as percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringWeights {
    /// Weight of the sharpness score.
    pub sharpness: u32,
    /// Weight of the lighting score.
    pub lighting: u32,
    /// Weight of the expression score.
    pub expression: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            sharpness: 35,
            lighting: 35,
            expression: 30,
        }
    }
}

impl ScoringWeights {
    /// Weighted mean of three 0-100 scores, rounded half up.
    ///
    /// Integer arithmetic keeps the result exact. All-zero weights yield 0.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn blend(&self, sharpness: u8, lighting: u8, expression: u8) -> u8 {
        let total = u64::from(self.sharpness) + u64::from(self.lighting) + u64::from(self.expression);
        if total == 0 {
            return 0;
        }
        let weighted = u64::from(self.sharpness) * u64::from(sharpness)
            + u64::from(self.lighting) * u64::from(lighting)
            + u64::from(self.expression) * u64::from(expression);
        // round(weighted / total) without floats; a weighted mean of values
        // <= 100 never exceeds 100
        ((2 * weighted + total) / (2 * total)) as u8
    }
}

/// Merges metrics into a [`QualityReport`].
#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    weights: ScoringWeights,
}

impl CompositeScorer {
    /// Creates a scorer with the given weights.
    #[must_use]
    pub const fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Returns the scoring weights.
    #[must_use]
    pub const fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Builds the report. Never fails.
    #[must_use]
    pub fn score(
        &self,
        sharpness: SharpnessMetric,
        lighting: LightingMetric,
        expression: ExpressionMetric,
    ) -> QualityReport {
        let overall_score = self
            .weights
            .blend(sharpness.score, lighting.score, expression.score);

        let mut warnings = Vec::new();
        if sharpness.is_blurry {
            warnings.push(format!(
                "Image is {}: Consider using a sharper photo",
                sharpness.severity
            ));
        }
        if !lighting.is_good_lighting {
            warnings.extend(lighting.issues.iter().cloned());
        }
        if !expression.face_detected {
            warnings.push(WARNING_NO_FACE.to_string());
        } else if !expression.has_smile {
            warnings.push(WARNING_NO_SMILE.to_string());
        }

        QualityReport {
            sharpness,
            lighting,
            expression,
            overall_score,
            warnings,
        }
    }
}
