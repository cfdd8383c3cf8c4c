//! Candle-backed expression classifier.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::{select_device, BlazeFace, ExpressionNet, LazyModel};
use crate::domain::{ClassifierError, ExpressionClassifier, FaceExpression, NullClassifier};

/// Where the classifier finds its weights and how it runs.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// `BlazeFace` weights.
    pub detector_path: Option<PathBuf>,
    /// Expression CNN weights.
    pub expression_path: Option<PathBuf>,
    /// Faces detected below this confidence are ignored.
    pub min_face_confidence: f32,
    /// Skip GPU probing.
    pub force_cpu: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            detector_path: None,
            expression_path: None,
            min_face_confidence: 0.75,
            force_cpu: false,
        }
    }
}

/// Face detection followed by per-face expression classification.
///
/// Both models load on the first call to [`ExpressionClassifier::detect`].
/// After a failed load the classifier reports itself unavailable.
pub struct CandleExpressionClassifier {
    detector: LazyModel<BlazeFace>,
    expression: LazyModel<ExpressionNet>,
    min_face_confidence: f32,
}

impl CandleExpressionClassifier {
    /// Creates the classifier; no weights are read yet.
    #[must_use]
    pub fn new(
        detector_path: impl Into<PathBuf>,
        expression_path: impl Into<PathBuf>,
        min_face_confidence: f32,
        force_cpu: bool,
    ) -> Self {
        let device = select_device(force_cpu);
        Self {
            detector: LazyModel::new(detector_path, device.clone(), BlazeFace::new),
            expression: LazyModel::new(expression_path, device, ExpressionNet::new),
            min_face_confidence,
        }
    }
}

impl ExpressionClassifier for CandleExpressionClassifier {
    fn name(&self) -> &'static str {
        "candle"
    }

    fn is_available(&self) -> bool {
        !(self.detector.has_failed() || self.expression.has_failed())
    }

    fn detect(
        &self,
        image: &image::DynamicImage,
    ) -> Result<Vec<FaceExpression>, ClassifierError> {
        let unavailable = |e: anyhow::Error| ClassifierError::Unavailable(format!("{e:#}"));
        let detector = self.detector.get().map_err(unavailable)?;
        let expression = self.expression.get().map_err(unavailable)?;

        let detections = detector.detect(image, self.min_face_confidence)?;
        debug!("Detected {} faces", detections.len());

        detections
            .into_iter()
            .map(|face| -> Result<FaceExpression, ClassifierError> {
                let weights = expression.classify(image, &face.bbox)?;
                Ok(FaceExpression {
                    bbox: face.bbox,
                    confidence: face.score,
                    weights,
                })
            })
            .collect()
    }
}

/// Builds the best classifier the configuration allows.
///
/// Falls back to a [`NullClassifier`] when a model path is missing or does
/// not exist, logging why.
#[must_use]
pub fn load_classifier(config: &ClassifierConfig) -> Arc<dyn ExpressionClassifier> {
    let (Some(detector), Some(expression)) = (&config.detector_path, &config.expression_path)
    else {
        info!("Expression models not configured, expression analysis uses the fallback");
        return Arc::new(NullClassifier::new("expression models not configured"));
    };

    if let Some(missing) = [detector, expression].into_iter().find(|p| !p.is_file()) {
        let reason = format!("model file not found: {}", missing.display());
        info!("{reason}; run `profile-qa models fetch` to enable expression analysis");
        return Arc::new(NullClassifier::new(reason));
    }

    Arc::new(CandleExpressionClassifier::new(
        detector,
        expression,
        config.min_face_confidence,
        config.force_cpu,
    ))
}
