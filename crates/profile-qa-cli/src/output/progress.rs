//! Progress bar adapter using indicatif.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use profile_qa_core::{ProgressEvent, ProgressSink};

/// Progress reporting on stderr.
///
/// Draws a bar when `show_bar` is set; otherwise prints one line per photo
/// with warnings or failures.
pub struct ProgressBar {
    bar: Option<IndicatifBar>,
    quiet: bool,
}

impl ProgressBar {
    /// Creates a new progress reporter for `total` photos.
    #[must_use]
    pub fn new(total: u64, quiet: bool, show_bar: bool) -> Self {
        if quiet {
            return Self {
                bar: None,
                quiet: true,
            };
        }

        let bar = show_bar.then(|| {
            let bar = IndicatifBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self { bar, quiet }
    }
}

impl ProgressSink for ProgressBar {
    fn on_event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }

        match event {
            ProgressEvent::Started { photo_id, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(photo_id);
                }
            }
            ProgressEvent::Completed { photo_id, report } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                } else if !report.warnings.is_empty() {
                    eprintln!(
                        "{photo_id}: score {}, {} warning(s)",
                        report.overall_score,
                        report.warnings.len()
                    );
                }
            }
            ProgressEvent::Failed { photo_id, reason } => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                eprintln!("WARN: {photo_id}: {reason}");
            }
            ProgressEvent::Finished { succeeded, failed } => {
                if let Some(bar) = &self.bar {
                    bar.finish_with_message(format!("Done: {succeeded} analyzed, {failed} failed"));
                }
            }
        }
    }
}
