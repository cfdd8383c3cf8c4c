//! Single-photo analysis pipeline.

use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};

use tracing::{debug, warn};

use crate::domain::{
    AnalysisError, ExpressionClassifier, ImageBuffer, NullClassifier, QualityReport,
};
use crate::modules::{
    CompositeScorer, ExpressionAnalyzer, ExpressionConfig, LightingAnalyzer, LightingConfig,
    ScoringWeights, SharpnessAnalyzer, SharpnessConfig, ValidationConfig, Validator,
};

/// Configuration of every analyzer in the pipeline.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Format and size limits.
    pub validation: ValidationConfig,
    /// Sharpness scoring.
    pub sharpness: SharpnessConfig,
    /// Lighting scoring.
    pub lighting: LightingConfig,
    /// Expression scoring.
    pub expression: ExpressionConfig,
    /// Composite weights.
    pub scoring: ScoringWeights,
}

/// Validates a buffer and produces its [`QualityReport`].
///
/// Sharpness, lighting and expression run on scoped threads sharing the
/// same buffer. Expression never fails, so a report is produced whenever
/// the buffer validates and decodes.
#[derive(Clone)]
pub struct QualityEngine {
    validator: Validator,
    sharpness: SharpnessAnalyzer,
    lighting: LightingAnalyzer,
    expression: ExpressionAnalyzer,
    scorer: CompositeScorer,
}

impl QualityEngine {
    /// Creates an engine backed by the given expression classifier.
    #[must_use]
    pub fn new(config: EngineConfig, classifier: Arc<dyn ExpressionClassifier>) -> Self {
        Self {
            validator: Validator::new(config.validation),
            sharpness: SharpnessAnalyzer::new(config.sharpness),
            lighting: LightingAnalyzer::new(config.lighting),
            expression: ExpressionAnalyzer::new(config.expression, classifier),
            scorer: CompositeScorer::new(config.scoring),
        }
    }

    /// Creates an engine whose expression metric is always the fallback.
    #[must_use]
    pub fn without_classifier(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(NullClassifier::new("expression analysis disabled")),
        )
    }

    /// Name of the expression classifier in use.
    #[must_use]
    pub fn classifier_name(&self) -> &'static str {
        self.expression.classifier_name()
    }

    /// Analyzes one photo.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Validation`] if the buffer is rejected and
    /// [`AnalysisError::Decode`] if it cannot be decoded.
    pub fn analyze(&self, buffer: &ImageBuffer) -> Result<QualityReport, AnalysisError> {
        let metadata = self.validator.validate(buffer).inspect_err(|e| {
            debug!("Rejected buffer of {} bytes: {e}", buffer.len());
        })?;
        debug!(
            "Validated {} {}x{} ({} bytes)",
            metadata.format, metadata.width, metadata.height, metadata.byte_size
        );

        let (sharpness, lighting, expression) = thread::scope(|s| {
            let sharpness = s.spawn(|| self.sharpness.analyze(buffer));
            let lighting = s.spawn(|| self.lighting.analyze(buffer));
            let expression = s.spawn(|| self.expression.analyze(buffer));
            (join(sharpness), join(lighting), join(expression))
        });

        let report = self.scorer.score(sharpness?, lighting?, expression);
        if !report.warnings.is_empty() {
            debug!("Report carries {} warnings", report.warnings.len());
        }
        Ok(report)
    }
}

/// Joins a scoped analyzer thread, re-raising its panic on this thread.
fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle.join().unwrap_or_else(|payload| {
        warn!("Analyzer thread panicked");
        std::panic::resume_unwind(payload)
    })
}
