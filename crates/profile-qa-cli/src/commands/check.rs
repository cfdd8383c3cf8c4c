//! Check command - score photos.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use profile_qa_adapters::{FsByteSource, ModelStore};
use profile_qa_core::{
    load_classifier, BatchConfig, BatchOrchestrator, BatchResult, ByteSource, EngineConfig,
    ExpressionClassifier, NullClassifier, QualityEngine, ReportSink,
};
use tracing::{debug, info};

use super::ExitCode;
use crate::config::{timeout_from_secs, AppConfig};
use crate::output::{JsonOutput, ProgressBar};

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON array
    Json,
}

/// Parse a positive number of seconds.
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    timeout_from_secs(value)
        .ok_or_else(|| format!("{value} is not a positive number of seconds within range"))
}

/// Shared arguments for photo analysis.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct CheckArgs {
    /// Files or directories to analyze
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip the expression classifier (expression uses the neutral fallback)
    #[arg(long)]
    pub no_expression: bool,

    /// Photos analyzed in parallel [default: number of CPUs]
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Per-photo timeout in seconds [default: 60]
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: AppConfig,
}

impl CheckArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Built-in defaults (in accessor methods and core config types)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    ///
    /// For boolean flags the CLI flag always wins; config applies only when
    /// the flag was not passed.
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }
        if !args.no_expression {
            if let Some(enabled) = config.expression.enabled {
                args.no_expression = !enabled;
            }
        }

        if args.workers.is_none() {
            args.workers = config
                .batch
                .workers
                .filter(|&n| n > 0)
                .and_then(|n| u16::try_from(n).ok());
        }
        if args.timeout.is_none() {
            args.timeout = config.batch.timeout_secs.and_then(timeout_from_secs);
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_deref()
                .and_then(|s| OutputFormat::from_str(s, true).ok());
        }
        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }

        args.config = config.clone();
        args
    }

    /// Output format with fallback to JSONL.
    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Batch settings with fallback to the core defaults.
    fn batch_config(&self) -> BatchConfig {
        let defaults = BatchConfig::default();
        BatchConfig {
            workers: self.workers.map_or(defaults.workers, usize::from),
            timeout: self.timeout.unwrap_or(defaults.timeout),
        }
    }

    /// Model store honouring `--models-dir` and `[models] dir`.
    fn model_store(&self) -> ModelStore {
        self.models_dir
            .as_ref()
            .map_or_else(ModelStore::default, ModelStore::new)
    }
}

/// Result of running the check command.
#[allow(dead_code)] // Fields exposed for programmatic use
pub struct CheckResult {
    /// Number of photos analyzed.
    pub analyzed: usize,
    /// Number of photos that could not be analyzed.
    pub failed: usize,
    /// Number of analyzed photos with warnings.
    pub with_warnings: usize,
    /// Exit code.
    pub exit_code: ExitCode,
}

impl CheckResult {
    fn from_batch(batch: &BatchResult) -> Self {
        let with_warnings = batch
            .results()
            .iter()
            .filter_map(|r| r.report())
            .filter(|report| !report.warnings.is_empty())
            .count();
        let failed = batch.failure_count();
        let exit_code = if failed > 0 || with_warnings > 0 {
            ExitCode::IssuesFound
        } else {
            ExitCode::Success
        };
        Self {
            analyzed: batch.success_count(),
            failed,
            with_warnings,
            exit_code,
        }
    }
}

/// Run the check command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &CheckArgs) -> Result<CheckResult> {
    info!("Running check command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }

    let engine_config = args.config.engine_config();
    let source = Arc::new(
        FsByteSource::new(args.paths.clone(), args.recursive)
            .with_read_limit(engine_config.validation.max_bytes),
    );
    let total = source.photo_ids().len();

    let engine = QualityEngine::new(engine_config, build_classifier(args));
    debug!("Expression classifier: {}", engine.classifier_name());

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = Arc::new(ProgressBar::new(total as u64, args.quiet, show_progress));

    let orchestrator = BatchOrchestrator::new(Arc::new(engine), args.batch_config())
        .with_progress(progress);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let batch = runtime.block_on(orchestrator.analyze_source(source));
    // Timed-out photos may still hold blocking threads; don't wait for them.
    runtime.shutdown_background();

    let output = JsonOutput::stdout(args.format(), args.pretty);
    write_results(&batch, &output)?;

    let result = CheckResult::from_batch(&batch);
    info!(
        "Analyzed {} photos ({} with warnings), {} failed in {:.2?}",
        result.analyzed,
        result.with_warnings,
        result.failed,
        batch.elapsed()
    );
    Ok(result)
}

/// Writes every result in input order, then flushes.
fn write_results(batch: &BatchResult, sink: &dyn ReportSink) -> Result<()> {
    for result in batch.results() {
        sink.write(result)
            .with_context(|| format!("Failed to write result for {}", result.photo_id))?;
    }
    sink.flush().context("Failed to flush output")
}

/// Build the expression classifier from args, config and installed models.
fn build_classifier(args: &CheckArgs) -> Arc<dyn ExpressionClassifier> {
    if args.no_expression {
        debug!("Expression classifier disabled");
        return Arc::new(NullClassifier::new("expression analysis disabled"));
    }

    let store = args.model_store();
    if !store.all_installed() {
        info!(
            "Expression classifier unavailable: models not found in {}. Run `profile-qa models fetch`.",
            store.dir().display()
        );
    }

    let mut classifier_config = store.classifier_config();
    if let Some(confidence) = args
        .config
        .expression
        .min_face_confidence
        .filter(|c| (0.0..=1.0).contains(c))
    {
        classifier_config.min_face_confidence = confidence;
    }
    classifier_config.force_cpu = args.config.models.force_cpu.unwrap_or(false);

    load_classifier(&classifier_config)
}
