//! Progress reporting port for UI integration.

use crate::domain::QualityReport;

/// Events emitted while a batch is analyzed.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Analysis started for a photo.
    Started {
        /// Photo identifier.
        photo_id: String,
        /// Position in the batch (0-based).
        index: usize,
        /// Total photos in the batch.
        total: usize,
    },
    /// A photo was analyzed.
    Completed {
        /// Photo identifier.
        photo_id: String,
        /// The finished report.
        report: QualityReport,
    },
    /// A photo could not be analyzed.
    Failed {
        /// Photo identifier.
        photo_id: String,
        /// Why it failed.
        reason: String,
    },
    /// Every photo of the batch has been handled.
    Finished {
        /// Photos analyzed successfully.
        succeeded: usize,
        /// Photos that failed.
        failed: usize,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}
