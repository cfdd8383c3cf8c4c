//! Mock implementations of core ports and the expression classifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use image::{DynamicImage, GenericImageView};
use profile_qa_core::domain::{
    ClassifierError, ExpressionClassifier, ExpressionWeights, FaceExpression, ImageBuffer,
    PhotoResult,
};
use profile_qa_core::ports::{ByteSource, ProgressEvent, ProgressSink, ReportSink};

// === Classifiers ===

/// Classifier returning a fixed set of faces for every image.
///
/// Can be told to stall on images of one particular width, which lets tests
/// force a single photo of a batch past its timeout.
#[derive(Debug, Default)]
pub struct MockClassifier {
    faces: Vec<FaceExpression>,
    stall: Option<(u32, Duration)>,
    calls: AtomicUsize,
}

impl MockClassifier {
    /// Classifier that reports `faces` for every image.
    #[must_use]
    pub fn new(faces: Vec<FaceExpression>) -> Self {
        Self {
            faces,
            ..Self::default()
        }
    }

    /// Classifier that finds nobody.
    #[must_use]
    pub fn no_faces() -> Self {
        Self::new(Vec::new())
    }

    /// One clearly smiling face.
    #[must_use]
    pub fn smiling() -> Self {
        Self::with_weights(ExpressionWeights {
            happy: 0.9,
            neutral: 0.1,
            ..ExpressionWeights::default()
        })
    }

    /// One face with a neutral expression.
    #[must_use]
    pub fn neutral() -> Self {
        Self::with_weights(ExpressionWeights {
            neutral: 0.95,
            sad: 0.05,
            ..ExpressionWeights::default()
        })
    }

    /// One face with the given expression weights.
    #[must_use]
    pub fn with_weights(weights: ExpressionWeights) -> Self {
        Self::new(vec![FaceExpression {
            bbox: [0.25, 0.2, 0.75, 0.8],
            confidence: 0.98,
            weights,
        }])
    }

    /// Sleeps for `delay` before answering on images exactly `width` pixels wide.
    #[must_use]
    pub fn stall_on_width(mut self, width: u32, delay: Duration) -> Self {
        self.stall = Some((width, delay));
        self
    }

    /// Number of `detect` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExpressionClassifier for MockClassifier {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceExpression>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((width, delay)) = self.stall {
            if image.dimensions().0 == width {
                std::thread::sleep(delay);
            }
        }
        Ok(self.faces.clone())
    }
}

/// Classifier whose inference always errors.
#[derive(Debug, Default)]
pub struct FailingClassifier;

impl ExpressionClassifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceExpression>, ClassifierError> {
        Err(ClassifierError::Inference(anyhow::anyhow!(
            "simulated inference failure"
        )))
    }
}

/// Classifier that panics during inference.
#[derive(Debug, Default)]
pub struct PanickingClassifier;

impl ExpressionClassifier for PanickingClassifier {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn detect(&self, _image: &DynamicImage) -> Result<Vec<FaceExpression>, ClassifierError> {
        panic!("simulated classifier panic")
    }
}

// === Ports ===

/// In-memory `ByteSource` with optional per-photo fetch failures.
pub struct MockByteSource {
    order: Vec<String>,
    entries: HashMap<String, Result<ImageBuffer, String>>,
    stalls: HashMap<String, Duration>,
    fetches: AtomicUsize,
}

impl MockByteSource {
    /// Source serving the given photos in order.
    #[must_use]
    pub fn new(photos: Vec<(String, ImageBuffer)>) -> Self {
        let mut source = Self::empty();
        for (id, buffer) in photos {
            source.order.push(id.clone());
            source.entries.insert(id, Ok(buffer));
        }
        source
    }

    /// Source with no photos.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
            stalls: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Appends a photo whose fetch fails with `message`.
    #[must_use]
    pub fn with_failure(mut self, photo_id: impl Into<String>, message: impl Into<String>) -> Self {
        let id = photo_id.into();
        self.order.push(id.clone());
        self.entries.insert(id, Err(message.into()));
        self
    }

    /// Makes `fetch` of `photo_id` sleep for `delay` before answering.
    #[must_use]
    pub fn stall_on(mut self, photo_id: impl Into<String>, delay: Duration) -> Self {
        self.stalls.insert(photo_id.into(), delay);
        self
    }

    /// Number of `fetch` calls so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ByteSource for MockByteSource {
    fn photo_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    fn fetch(&self, photo_id: &str) -> anyhow::Result<ImageBuffer> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stalls.get(photo_id) {
            std::thread::sleep(*delay);
        }
        match self.entries.get(photo_id) {
            Some(Ok(buffer)) => Ok(buffer.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!("{message}")),
            None => anyhow::bail!("unknown photo {photo_id}"),
        }
    }
}

/// What a [`MockReportSink`] saw for one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResult {
    /// Photo identifier.
    pub photo_id: String,
    /// Overall score on success.
    pub overall_score: Option<u8>,
    /// Error kind on failure.
    pub error_kind: Option<&'static str>,
}

/// `ReportSink` capturing what it receives.
#[derive(Default)]
pub struct MockReportSink {
    results: Arc<Mutex<Vec<RecordedResult>>>,
    flush_count: AtomicUsize,
}

impl MockReportSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn results(&self) -> Vec<RecordedResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `flush` calls.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

impl ReportSink for MockReportSink {
    fn write(&self, result: &PhotoResult) -> anyhow::Result<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedResult {
                photo_id: result.photo_id.clone(),
                overall_score: result.report().map(|r| r.overall_score),
                error_kind: result.error().map(profile_qa_core::AnalysisError::kind),
            });
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// `ProgressSink` capturing events for later assertions.
#[derive(Default)]
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `Started` events.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Started { .. }))
    }

    /// Number of `Completed` events.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Completed { .. }))
    }

    /// Number of `Failed` events.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|e| matches!(e, ProgressEvent::Failed { .. }))
    }

    /// `(succeeded, failed)` from the `Finished` event, if any.
    #[must_use]
    pub fn finished_counts(&self) -> Option<(usize, usize)> {
        self.events().iter().find_map(|e| match e {
            ProgressEvent::Finished { succeeded, failed } => Some((*succeeded, *failed)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
