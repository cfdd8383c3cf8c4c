//! Per-photo reports and batch aggregates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{AnalysisError, ExpressionMetric, LightingMetric, SharpnessMetric};

/// Complete quality assessment of a single photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// Focus quality.
    pub sharpness: SharpnessMetric,
    /// Brightness and contrast.
    pub lighting: LightingMetric,
    /// Smile signal.
    pub expression: ExpressionMetric,
    /// Weighted blend of the three scores (0-100).
    pub overall_score: u8,
    /// Actionable warnings, most important first.
    pub warnings: Vec<String>,
}

/// Outcome for one photo of a batch.
#[derive(Debug)]
pub struct PhotoResult {
    /// Caller-supplied identifier.
    pub photo_id: String,
    /// The report, or why there is none.
    pub outcome: Result<QualityReport, AnalysisError>,
    /// Wall-clock time spent on this photo.
    pub elapsed: Duration,
}

impl PhotoResult {
    /// Returns true if the photo was analyzed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The report, if the photo was analyzed.
    #[must_use]
    pub fn report(&self) -> Option<&QualityReport> {
        self.outcome.as_ref().ok()
    }

    /// The failure, if the photo was not analyzed.
    #[must_use]
    pub fn error(&self) -> Option<&AnalysisError> {
        self.outcome.as_ref().err()
    }
}

/// Result of analyzing a batch, one entry per input photo in input order.
#[derive(Debug)]
pub struct BatchResult {
    results: Vec<PhotoResult>,
    elapsed: Duration,
}

impl BatchResult {
    /// Creates a batch result from per-photo results already in input order.
    #[must_use]
    pub const fn new(results: Vec<PhotoResult>, elapsed: Duration) -> Self {
        Self { results, elapsed }
    }

    /// Per-photo results in input order.
    #[must_use]
    pub fn results(&self) -> &[PhotoResult] {
        &self.results
    }

    /// Consumes the batch, yielding per-photo results.
    #[must_use]
    pub fn into_results(self) -> Vec<PhotoResult> {
        self.results
    }

    /// Number of photos processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of photos analyzed successfully.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of photos that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.total() - self.success_count()
    }

    /// Total wall-clock time of the batch.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Successful results ordered by overall score, best first.
    ///
    /// Ties keep input order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, &QualityReport)> {
        let mut ranked: Vec<_> = self
            .results
            .iter()
            .filter_map(|r| r.report().map(|report| (r.photo_id.as_str(), report)))
            .collect();
        ranked.sort_by(|a, b| b.1.overall_score.cmp(&a.1.overall_score));
        ranked
    }

    /// Mean overall score of successful photos, if any succeeded.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn mean_overall_score(&self) -> Option<f64> {
        let scores: Vec<u8> = self
            .results
            .iter()
            .filter_map(|r| r.report().map(|report| report.overall_score))
            .collect();
        if scores.is_empty() {
            return None;
        }
        let sum: u64 = scores.iter().map(|&s| u64::from(s)).sum();
        Some(sum as f64 / scores.len() as f64)
    }
}
