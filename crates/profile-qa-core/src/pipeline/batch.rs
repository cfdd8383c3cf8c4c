//! Batch orchestration over many photos.
//!
//! Each photo runs on tokio's blocking pool under its own timeout, which
//! covers fetching its bytes as well as analyzing them. Photos are processed
//! with bounded parallelism and results come back in input order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::QualityEngine;
use crate::domain::{AnalysisError, BatchResult, ImageBuffer, PhotoResult, QualityReport};
use crate::ports::{ByteSource, ProgressEvent, ProgressSink};

/// Configuration for batch processing.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum photos analyzed at once.
    pub workers: usize,
    /// Wall-clock limit for one photo.
    pub timeout: Duration,
}

impl BatchConfig {
    /// Default per-photo timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Where the bytes of a photo come from.
enum Input {
    Ready(ImageBuffer),
    Deferred(Arc<dyn ByteSource>),
}

/// Runs the [`QualityEngine`] over a batch of photos.
pub struct BatchOrchestrator {
    engine: Arc<QualityEngine>,
    config: BatchConfig,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator around a shared engine.
    #[must_use]
    pub fn new(engine: Arc<QualityEngine>, config: BatchConfig) -> Self {
        Self {
            engine,
            config,
            progress: None,
        }
    }

    /// Reports progress events to `sink`.
    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Returns the batch configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Analyzes in-memory photos.
    ///
    /// Every input yields exactly one [`PhotoResult`], in input order. A
    /// failing photo never affects the others.
    pub async fn analyze_batch(&self, photos: Vec<(String, ImageBuffer)>) -> BatchResult {
        let inputs = photos
            .into_iter()
            .map(|(photo_id, buffer)| (photo_id, Input::Ready(buffer)))
            .collect();
        self.run(inputs).await
    }

    /// Analyzes every photo a byte source lists.
    ///
    /// Bytes are fetched lazily, only when a worker picks the photo up. A
    /// fetch failure becomes an [`AnalysisError::Source`] for that photo.
    pub async fn analyze_source(&self, source: Arc<dyn ByteSource>) -> BatchResult {
        let inputs = source
            .photo_ids()
            .into_iter()
            .map(|photo_id| (photo_id, Input::Deferred(Arc::clone(&source))))
            .collect();
        self.run(inputs).await
    }

    async fn run(&self, inputs: Vec<(String, Input)>) -> BatchResult {
        let started = Instant::now();
        let total = inputs.len();
        let workers = self.config.workers.max(1);
        info!("Analyzing {total} photos with {workers} workers");

        let mut indexed: Vec<(usize, PhotoResult)> = stream::iter(inputs.into_iter().enumerate())
            .map(|(index, (photo_id, input))| async move {
                (index, self.process(index, total, photo_id, input).await)
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let batch = BatchResult::new(
            indexed.into_iter().map(|(_, result)| result).collect(),
            started.elapsed(),
        );

        info!(
            "Batch finished in {:.2}s: {} analyzed, {} failed",
            batch.elapsed().as_secs_f64(),
            batch.success_count(),
            batch.failure_count()
        );
        self.emit(ProgressEvent::Finished {
            succeeded: batch.success_count(),
            failed: batch.failure_count(),
        });

        batch
    }

    async fn process(
        &self,
        index: usize,
        total: usize,
        photo_id: String,
        input: Input,
    ) -> PhotoResult {
        let started = Instant::now();
        self.emit(ProgressEvent::Started {
            photo_id: photo_id.clone(),
            index,
            total,
        });

        let work = async {
            let buffer = self.fetch(&photo_id, input).await?;
            self.analyze(buffer).await
        };
        let outcome = match tokio::time::timeout(self.config.timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AnalysisError::Timeout {
                elapsed: started.elapsed(),
            }),
        };

        match &outcome {
            Ok(report) => {
                debug!("{photo_id}: overall score {}", report.overall_score);
                self.emit(ProgressEvent::Completed {
                    photo_id: photo_id.clone(),
                    report: report.clone(),
                });
            }
            Err(e) => {
                warn!("{photo_id}: {e}");
                self.emit(ProgressEvent::Failed {
                    photo_id: photo_id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        PhotoResult {
            photo_id,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    async fn fetch(&self, photo_id: &str, input: Input) -> Result<ImageBuffer, AnalysisError> {
        match input {
            Input::Ready(buffer) => Ok(buffer),
            Input::Deferred(source) => {
                let id = photo_id.to_string();
                tokio::task::spawn_blocking(move || source.fetch(&id))
                    .await
                    .map_err(|e| AnalysisError::Internal(e.to_string()))?
                    .map_err(|e| AnalysisError::Source(format!("{e:#}")))
            }
        }
    }

    /// Runs the engine on the blocking pool.
    ///
    /// If the surrounding timeout fires, the blocking task keeps running to
    /// completion and its result is dropped.
    async fn analyze(&self, buffer: ImageBuffer) -> Result<QualityReport, AnalysisError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.analyze(&buffer))
            .await
            .map_err(|e| AnalysisError::Internal(e.to_string()))?
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.progress {
            sink.on_event(event);
        }
    }
}
