//! Configuration file support for profile-qa.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/profile-qa/config.toml` (lowest priority)
//! - Project-local: `.profile-qa.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use profile_qa_core::{
    EngineConfig, ExpressionConfig, LightingConfig, ScoringWeights, SharpnessConfig,
    ValidationConfig,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Name of the project-local config file.
const PROJECT_FILE: &str = ".profile-qa.toml";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Input validation limits.
    pub validation: ValidationSection,
    /// Sharpness scoring.
    pub sharpness: SharpnessSection,
    /// Lighting scoring.
    pub lighting: LightingSection,
    /// Expression scoring.
    pub expression: ExpressionSection,
    /// Composite weights.
    pub scoring: ScoringSection,
    /// Batch execution.
    pub batch: BatchSection,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// `[validation]`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Minimum width and height in pixels.
    pub min_dimension: Option<u32>,
    /// Maximum width and height in pixels.
    pub max_dimension: Option<u32>,
    /// Maximum file size in bytes.
    pub max_bytes: Option<u64>,
}

/// `[sharpness]`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SharpnessSection {
    /// Laplacian variance divisor.
    pub variance_divisor: Option<f64>,
}

/// `[lighting]`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LightingSection {
    /// Pixel sampling stride.
    pub sample_stride: Option<u32>,
    /// Luma standard deviation mapping to contrast 100.
    pub contrast_reference: Option<f64>,
    /// Too dark below this brightness.
    pub dark_below: Option<u8>,
    /// Overexposed above this brightness.
    pub bright_above: Option<u8>,
    /// Flat below this contrast.
    pub flat_below: Option<u8>,
    /// Harsh above this contrast.
    pub harsh_above: Option<u8>,
    /// Good lighting at or above this score.
    pub good_threshold: Option<u8>,
}

/// `[expression]`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ExpressionSection {
    /// Enable/disable the expression classifier.
    pub enabled: Option<bool>,
    /// Score reported when the classifier cannot be used.
    pub fallback_score: Option<u8>,
    /// Smile at or above this score.
    pub smile_threshold: Option<u8>,
    /// Minimum face detection confidence.
    pub min_face_confidence: Option<f32>,
}

/// `[scoring]`, as percentages.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// Weight of sharpness.
    pub sharpness: Option<u32>,
    /// Weight of lighting.
    pub lighting: Option<u32>,
    /// Weight of expression.
    pub expression: Option<u32>,
}

/// `[batch]`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Photos analyzed in parallel.
    pub workers: Option<usize>,
    /// Per-photo timeout in seconds.
    pub timeout_secs: Option<f64>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
    /// URL the model files are downloaded from.
    pub base_url: Option<String>,
    /// Expected SHA-256 digests by model name.
    pub sha256: HashMap<String, String>,
    /// Never probe for a GPU.
    pub force_cpu: Option<bool>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/profile-qa/config.toml`
    /// 2. Project-local: `.profile-qa.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are reported as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        for problem in config.validate() {
            eprintln!("warning: {problem}");
        }

        config
    }

    /// Engine settings: config values over built-in defaults.
    ///
    /// Values that failed validation fall back to the defaults.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let v = ValidationConfig::default();
        let s = SharpnessConfig::default();
        let l = LightingConfig::default();
        let e = ExpressionConfig::default();
        let w = ScoringWeights::default();

        let percent = |value: Option<u8>, default: u8| value.filter(|&p| p <= 100).unwrap_or(default);

        let scoring = ScoringWeights {
            sharpness: self.scoring.sharpness.unwrap_or(w.sharpness),
            lighting: self.scoring.lighting.unwrap_or(w.lighting),
            expression: self.scoring.expression.unwrap_or(w.expression),
        };
        let scoring = if scoring.sharpness + scoring.lighting + scoring.expression == 0 {
            w
        } else {
            scoring
        };

        EngineConfig {
            validation: ValidationConfig {
                min_dimension: self.validation.min_dimension.unwrap_or(v.min_dimension),
                max_dimension: self.validation.max_dimension.unwrap_or(v.max_dimension),
                max_bytes: self.validation.max_bytes.unwrap_or(v.max_bytes),
            },
            sharpness: SharpnessConfig {
                variance_divisor: self
                    .sharpness
                    .variance_divisor
                    .filter(|d| *d > 0.0)
                    .unwrap_or(s.variance_divisor),
            },
            lighting: LightingConfig {
                sample_stride: self
                    .lighting
                    .sample_stride
                    .filter(|&n| n > 0)
                    .unwrap_or(l.sample_stride),
                contrast_reference: self
                    .lighting
                    .contrast_reference
                    .filter(|r| *r > 0.0)
                    .unwrap_or(l.contrast_reference),
                dark_below: percent(self.lighting.dark_below, l.dark_below),
                bright_above: percent(self.lighting.bright_above, l.bright_above),
                flat_below: percent(self.lighting.flat_below, l.flat_below),
                harsh_above: percent(self.lighting.harsh_above, l.harsh_above),
                good_threshold: percent(self.lighting.good_threshold, l.good_threshold),
            },
            expression: ExpressionConfig {
                fallback_score: percent(self.expression.fallback_score, e.fallback_score),
                smile_threshold: percent(self.expression.smile_threshold, e.smile_threshold),
            },
            scoring,
        }
    }

    /// Checks value ranges, returning one message per problem.
    fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let percents = [
            ("lighting.dark_below", self.lighting.dark_below),
            ("lighting.bright_above", self.lighting.bright_above),
            ("lighting.flat_below", self.lighting.flat_below),
            ("lighting.harsh_above", self.lighting.harsh_above),
            ("lighting.good_threshold", self.lighting.good_threshold),
            ("expression.fallback_score", self.expression.fallback_score),
            ("expression.smile_threshold", self.expression.smile_threshold),
        ];
        for (key, value) in percents {
            if let Some(p) = value.filter(|&p| p > 100) {
                problems.push(format!("{key} must be 0-100, got {p}"));
            }
        }

        if let (Some(min), Some(max)) = (self.validation.min_dimension, self.validation.max_dimension)
        {
            if min > max {
                problems.push(format!(
                    "validation.min_dimension ({min}) exceeds validation.max_dimension ({max})"
                ));
            }
        }
        if let Some(d) = self.sharpness.variance_divisor.filter(|d| *d <= 0.0) {
            problems.push(format!("sharpness.variance_divisor must be positive, got {d}"));
        }
        if self.lighting.sample_stride == Some(0) {
            problems.push("lighting.sample_stride must be at least 1".to_string());
        }
        if let Some(r) = self.lighting.contrast_reference.filter(|r| *r <= 0.0) {
            problems.push(format!("lighting.contrast_reference must be positive, got {r}"));
        }
        if let Some(c) = self.expression.min_face_confidence {
            if !(0.0..=1.0).contains(&c) {
                problems.push(format!("expression.min_face_confidence must be 0.0-1.0, got {c}"));
            }
        }
        let weights = [
            self.scoring.sharpness,
            self.scoring.lighting,
            self.scoring.expression,
        ];
        if weights.iter().all(|w| *w == Some(0)) {
            problems.push("scoring weights must not all be zero".to_string());
        }
        if self.batch.workers == Some(0) {
            problems.push("batch.workers must be at least 1".to_string());
        }
        if let Some(t) = self.batch.timeout_secs.filter(|t| timeout_from_secs(*t).is_none()) {
            problems.push(format!(
                "batch.timeout_secs must be a positive number of seconds within range, got {t}"
            ));
        }
        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                problems.push(format!("output.format must be 'json' or 'jsonl', got '{f}'"));
            }
        }

        problems
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        let v = &mut self.validation;
        v.min_dimension = other.validation.min_dimension.or(v.min_dimension);
        v.max_dimension = other.validation.max_dimension.or(v.max_dimension);
        v.max_bytes = other.validation.max_bytes.or(v.max_bytes);

        let s = &mut self.sharpness;
        s.variance_divisor = other.sharpness.variance_divisor.or(s.variance_divisor);

        let l = &mut self.lighting;
        l.sample_stride = other.lighting.sample_stride.or(l.sample_stride);
        l.contrast_reference = other.lighting.contrast_reference.or(l.contrast_reference);
        l.dark_below = other.lighting.dark_below.or(l.dark_below);
        l.bright_above = other.lighting.bright_above.or(l.bright_above);
        l.flat_below = other.lighting.flat_below.or(l.flat_below);
        l.harsh_above = other.lighting.harsh_above.or(l.harsh_above);
        l.good_threshold = other.lighting.good_threshold.or(l.good_threshold);

        let e = &mut self.expression;
        e.enabled = other.expression.enabled.or(e.enabled);
        e.fallback_score = other.expression.fallback_score.or(e.fallback_score);
        e.smile_threshold = other.expression.smile_threshold.or(e.smile_threshold);
        e.min_face_confidence = other
            .expression
            .min_face_confidence
            .or(e.min_face_confidence);

        let w = &mut self.scoring;
        w.sharpness = other.scoring.sharpness.or(w.sharpness);
        w.lighting = other.scoring.lighting.or(w.lighting);
        w.expression = other.scoring.expression.or(w.expression);

        self.batch.workers = other.batch.workers.or(self.batch.workers);
        self.batch.timeout_secs = other.batch.timeout_secs.or(self.batch.timeout_secs);

        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());
        self.models.base_url = other.models.base_url.or_else(|| self.models.base_url.take());
        self.models.sha256.extend(other.models.sha256);
        self.models.force_cpu = other.models.force_cpu.or(self.models.force_cpu);

        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);
    }
}

/// Get the XDG config file path.
/// Converts a per-photo timeout in seconds, rejecting values that are not
/// positive or do not fit in a [`Duration`].
pub fn timeout_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("profile-qa").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.profile-qa.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_FILE))
        .find(|path| path.exists())
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
