//! Expression analysis.
//!
//! Derives a smile score from the most prominent face reported by an
//! [`ExpressionClassifier`]. Expression is best-effort: whenever the
//! classifier is missing, fails, or panics, the analyzer returns a fixed
//! neutral fallback instead of an error.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{
    ExpressionClassifier, ExpressionMetric, ExpressionScores, ExpressionWeights, ImageBuffer,
    NullClassifier, SmileConfidence,
};

/// Configuration for expression scoring.
#[derive(Debug, Clone)]
pub struct ExpressionConfig {
    /// Smile score reported when the classifier cannot be used.
    pub fallback_score: u8,
    /// Smile scores at or above this count as a smile.
    pub smile_threshold: u8,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            fallback_score: 50,
            smile_threshold: 30,
        }
    }
}

/// Best-effort smile analyzer over a pluggable classifier.
#[derive(Clone)]
pub struct ExpressionAnalyzer {
    config: ExpressionConfig,
    classifier: Arc<dyn ExpressionClassifier>,
}

impl ExpressionAnalyzer {
    /// Creates an analyzer backed by the given classifier.
    #[must_use]
    pub fn new(config: ExpressionConfig, classifier: Arc<dyn ExpressionClassifier>) -> Self {
        Self { config, classifier }
    }

    /// Creates an analyzer with no classifier; every call yields the fallback.
    #[must_use]
    pub fn without_classifier() -> Self {
        Self::new(
            ExpressionConfig::default(),
            Arc::new(NullClassifier::new("no expression classifier configured")),
        )
    }

    /// Name of the backing classifier.
    #[must_use]
    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Analyzes the buffer. Never fails.
    #[must_use]
    pub fn analyze(&self, buffer: &ImageBuffer) -> ExpressionMetric {
        if !self.classifier.is_available() {
            debug!("Expression classifier unavailable, using fallback");
            return self.fallback();
        }

        let image = match buffer.decode() {
            Ok(image) => image,
            Err(e) => {
                warn!("Expression analysis skipped, decode failed: {e}");
                return self.fallback();
            }
        };

        let detection = panic::catch_unwind(AssertUnwindSafe(|| self.classifier.detect(&image)));

        match detection {
            Ok(Ok(faces)) => faces.first().map_or_else(
                || {
                    debug!("No faces detected");
                    no_face()
                },
                |face| {
                    debug!(
                        "Using face at {:?} (confidence {:.2}) of {} detected",
                        face.bbox,
                        face.confidence,
                        faces.len()
                    );
                    self.from_weights(face.weights)
                },
            ),
            Ok(Err(e)) => {
                warn!("Expression classifier {} failed: {e}", self.classifier.name());
                self.fallback()
            }
            Err(_) => {
                warn!("Expression classifier {} panicked", self.classifier.name());
                self.fallback()
            }
        }
    }

    /// Metric for a detected face with the given expression weights.
    #[must_use]
    pub fn from_weights(&self, weights: ExpressionWeights) -> ExpressionMetric {
        let weights = weights.clamped();
        let score = smile_score(&weights);
        ExpressionMetric {
            score,
            has_smile: score >= self.config.smile_threshold,
            confidence: SmileConfidence::from_score(score),
            face_detected: true,
            expressions: Some(ExpressionScores::from(weights)),
        }
    }

    /// Result used when the classifier cannot contribute.
    #[must_use]
    pub fn fallback(&self) -> ExpressionMetric {
        ExpressionMetric {
            score: self.config.fallback_score,
            has_smile: false,
            confidence: SmileConfidence::Neutral,
            face_detected: false,
            expressions: Some(ExpressionScores {
                neutral: 100,
                ..ExpressionScores::default()
            }),
        }
    }
}

/// Result when the classifier ran but found nobody.
fn no_face() -> ExpressionMetric {
    ExpressionMetric {
        score: 0,
        has_smile: false,
        confidence: SmileConfidence::NoFace,
        face_detected: false,
        expressions: None,
    }
}

/// Smile score from clamped weights: happiness dominates, sadness and anger
/// subtract, surprise adds a little.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn smile_score(w: &ExpressionWeights) -> u8 {
    let raw = 100.0 * f64::from(w.happy) - 20.0 * f64::from(w.sad) - 20.0 * f64::from(w.angry)
        + 10.0 * f64::from(w.surprised);
    // Clamped to 0..=100 before the cast
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassifierError, FaceExpression};
    use std::io::Cursor;

    struct Fixed(Vec<FaceExpression>);

    impl ExpressionClassifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(
            &self,
            _image: &image::DynamicImage,
        ) -> Result<Vec<FaceExpression>, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl ExpressionClassifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn detect(
            &self,
            _image: &image::DynamicImage,
        ) -> Result<Vec<FaceExpression>, ClassifierError> {
            Err(ClassifierError::Inference(anyhow::anyhow!("tensor shape mismatch")))
        }
    }

    struct Panicky;

    impl ExpressionClassifier for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }

        fn detect(
            &self,
            _image: &image::DynamicImage,
        ) -> Result<Vec<FaceExpression>, ClassifierError> {
            panic!("model exploded")
        }
    }

    fn face(weights: ExpressionWeights) -> FaceExpression {
        FaceExpression {
            bbox: [0.2, 0.2, 0.8, 0.8],
            confidence: 0.9,
            weights,
        }
    }

    fn buffer() -> ImageBuffer {
        let mut bytes = Vec::new();
        let _ = image::DynamicImage::new_rgb8(16, 16)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png);
        ImageBuffer::new(bytes)
    }

    fn analyzer(classifier: impl ExpressionClassifier + 'static) -> ExpressionAnalyzer {
        ExpressionAnalyzer::new(ExpressionConfig::default(), Arc::new(classifier))
    }

    #[test]
    fn test_smile_score_formula() {
        let w = ExpressionWeights {
            happy: 0.5,
            neutral: 0.2,
            sad: 0.1,
            angry: 0.1,
            surprised: 0.3,
        };
        // 50 - 2 - 2 + 3
        assert_eq!(smile_score(&w), 49);
    }

    #[test]
    fn test_smile_score_clamps() {
        let sad = ExpressionWeights {
            sad: 1.0,
            angry: 1.0,
            ..ExpressionWeights::default()
        };
        assert_eq!(smile_score(&sad), 0);

        let ecstatic = ExpressionWeights {
            happy: 1.0,
            surprised: 1.0,
            ..ExpressionWeights::default()
        };
        assert_eq!(smile_score(&ecstatic), 100);
    }

    #[test]
    fn test_unavailable_classifier_falls_back() {
        let metric = ExpressionAnalyzer::without_classifier().analyze(&buffer());
        assert_eq!(metric.score, 50);
        assert!(!metric.has_smile);
        assert!(!metric.face_detected);
        assert_eq!(metric.confidence, SmileConfidence::Neutral);
        assert_eq!(metric.expressions.map(|e| e.neutral), Some(100));
    }

    #[test]
    fn test_failing_classifier_falls_back() {
        let a = analyzer(Broken);
        assert_eq!(a.analyze(&buffer()), a.fallback());
    }

    #[test]
    fn test_panicking_classifier_falls_back() {
        let a = analyzer(Panicky);
        assert_eq!(a.analyze(&buffer()), a.fallback());
    }

    #[test]
    fn test_undecodable_buffer_falls_back() {
        let a = analyzer(Fixed(vec![]));
        let metric = a.analyze(&ImageBuffer::from(b"junk".as_slice()));
        assert_eq!(metric, a.fallback());
    }

    #[test]
    fn test_no_faces() {
        let metric = analyzer(Fixed(vec![])).analyze(&buffer());
        assert_eq!(metric.score, 0);
        assert!(!metric.face_detected);
        assert_eq!(metric.confidence, SmileConfidence::NoFace);
        assert!(metric.expressions.is_none());
    }

    #[test]
    fn test_first_face_is_used() {
        let happy = ExpressionWeights {
            happy: 0.9,
            neutral: 0.1,
            ..ExpressionWeights::default()
        };
        let glum = ExpressionWeights {
            sad: 0.9,
            ..ExpressionWeights::default()
        };
        let metric = analyzer(Fixed(vec![face(happy), face(glum)])).analyze(&buffer());
        assert!(metric.face_detected);
        assert_eq!(metric.score, 90);
        assert!(metric.has_smile);
        assert_eq!(metric.confidence, SmileConfidence::ClearSmile);
        let scores = metric.expressions.unwrap_or_default();
        assert_eq!(scores.happy, 90);
        assert_eq!(scores.neutral, 10);
    }

    #[test]
    fn test_confidence_buckets() {
        let a = ExpressionAnalyzer::without_classifier();
        let at = |happy: f32| {
            a.from_weights(ExpressionWeights {
                happy,
                ..ExpressionWeights::default()
            })
        };

        let slight = at(0.45);
        assert_eq!(slight.confidence, SmileConfidence::SlightSmile);
        assert!(slight.has_smile);

        let neutral = at(0.2);
        assert_eq!(neutral.confidence, SmileConfidence::Neutral);
        assert!(!neutral.has_smile);

        assert!(at(0.3).has_smile);
        assert_eq!(at(0.6).confidence, SmileConfidence::ClearSmile);
    }
}
