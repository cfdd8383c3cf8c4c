//! Analyzer implementations.
//!
//! Each analyzer owns one metric of the quality report; the composite scorer
//! merges them.

mod composite;
mod expression;
mod lighting;
mod sharpness;
mod validator;

pub use composite::{CompositeScorer, ScoringWeights, WARNING_NO_FACE, WARNING_NO_SMILE};
pub use expression::{ExpressionAnalyzer, ExpressionConfig};
pub use lighting::{
    LightingAnalyzer, LightingConfig, LumaStats, ISSUE_HIGH_CONTRAST, ISSUE_LOW_CONTRAST,
    ISSUE_OVEREXPOSED, ISSUE_TOO_DARK,
};
pub use sharpness::{laplacian_variance, SharpnessAnalyzer, SharpnessConfig};
pub use validator::{ValidationConfig, Validator};
