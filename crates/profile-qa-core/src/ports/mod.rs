//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the analysis core and external adapters.

mod byte_source;
mod progress;
mod report_sink;

pub use byte_source::ByteSource;
pub use progress::{ProgressEvent, ProgressSink};
pub use report_sink::ReportSink;
