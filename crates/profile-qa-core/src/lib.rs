//! Profile QA Core - image quality analysis engine
//!
//! This crate contains the domain types, the analyzers for sharpness,
//! lighting and expression, the composite scorer, and the engine and batch
//! orchestrator that run them over profile photos.

pub mod domain;
pub mod inference;
pub mod modules;
pub mod pipeline;
pub mod ports;

pub use domain::{
    AnalysisError, BatchResult, BlurSeverity, ClassifierError, DecodedMetadata,
    ExpressionClassifier, ExpressionMetric, ExpressionScores, ExpressionWeights, FaceExpression,
    ImageBuffer, ImageKind, LightingMetric, NullClassifier, PhotoResult, QualityReport,
    SharpnessMetric, SizeLimit, SmileConfidence, ValidationError,
};
pub use inference::{load_classifier, ClassifierConfig};
pub use modules::{
    ExpressionConfig, LightingConfig, ScoringWeights, SharpnessConfig, ValidationConfig,
};
pub use pipeline::{BatchConfig, BatchOrchestrator, EngineConfig, QualityEngine};
pub use ports::{ByteSource, ProgressEvent, ProgressSink, ReportSink};
