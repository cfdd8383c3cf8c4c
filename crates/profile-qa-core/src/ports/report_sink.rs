//! Report sink port for handing results to persistence or output.

use crate::domain::PhotoResult;

/// Port for receiving per-photo outcomes.
pub trait ReportSink: Send + Sync {
    /// Writes the outcome of a single photo.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write(&self, result: &PhotoResult) -> anyhow::Result<()>;

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&self) -> anyhow::Result<()>;
}
