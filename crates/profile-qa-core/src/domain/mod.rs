//! Core domain types for profile photo quality analysis.

mod buffer;
mod classifier;
mod error;
mod metrics;
mod report;

pub use buffer::{DecodedMetadata, ImageBuffer, ImageKind};
pub use classifier::{ExpressionClassifier, FaceExpression, NullClassifier};
pub use error::{AnalysisError, ClassifierError, SizeLimit, ValidationError};
pub use metrics::{
    BlurSeverity, ExpressionMetric, ExpressionScores, ExpressionWeights, LightingMetric,
    SharpnessMetric, SmileConfidence,
};
pub use report::{BatchResult, PhotoResult, QualityReport};
