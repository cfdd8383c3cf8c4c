//! Expression classifier capability.

use super::{ClassifierError, ExpressionWeights};

/// A face found by an expression classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceExpression {
    /// Face bounding box `[x_min, y_min, x_max, y_max]` in normalized `[0,1]` coordinates.
    pub bbox: [f32; 4],
    /// Detection confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Expression probabilities for this face.
    pub weights: ExpressionWeights,
}

/// Optional face-and-expression detector backing the expression analyzer.
///
/// Implementations must be safe to share between analysis threads. Any
/// model state is loaded at most once per instance.
pub trait ExpressionClassifier: Send + Sync {
    /// Returns the name of this classifier.
    fn name(&self) -> &'static str;

    /// Whether the classifier can run at all.
    ///
    /// An unavailable classifier is never asked to [`detect`](Self::detect).
    fn is_available(&self) -> bool {
        true
    }

    /// Detects faces and their expressions.
    ///
    /// Faces are ordered by prominence: the first entry is the one the
    /// expression metric is derived from.
    ///
    /// # Errors
    ///
    /// Returns an error if the models cannot be loaded or inference fails.
    fn detect(&self, image: &image::DynamicImage) -> Result<Vec<FaceExpression>, ClassifierError>;
}

/// Stand-in used when no expression models are installed.
#[derive(Debug, Clone, Default)]
pub struct NullClassifier {
    reason: Option<String>,
}

impl NullClassifier {
    /// Creates a null classifier recording why the real one is missing.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Why no real classifier is available, if known.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl ExpressionClassifier for NullClassifier {
    fn name(&self) -> &'static str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn detect(&self, _image: &image::DynamicImage) -> Result<Vec<FaceExpression>, ClassifierError> {
        Err(ClassifierError::Unavailable(
            self.reason
                .clone()
                .unwrap_or_else(|| "no classifier installed".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_classifier_is_unavailable() {
        let classifier = NullClassifier::new("models missing");
        assert_eq!(classifier.name(), "null");
        assert!(!classifier.is_available());
        assert_eq!(classifier.reason(), Some("models missing"));

        let image = image::DynamicImage::new_rgb8(8, 8);
        let err = classifier.detect(&image).err();
        assert!(matches!(err, Some(ClassifierError::Unavailable(ref r)) if r == "models missing"));
    }
}
