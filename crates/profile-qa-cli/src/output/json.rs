//! JSON output adapter.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use profile_qa_core::{PhotoResult, QualityReport, ReportSink};
use serde::Serialize;
use tracing::debug;

use crate::commands::check::OutputFormat;

/// One line (or array element) of output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord<'a> {
    /// Photo identifier (the file path).
    pub photo_id: &'a str,
    /// When the record was written, RFC 3339 UTC.
    pub analyzed_at: String,
    /// `ok` or `failed`.
    pub status: &'static str,
    /// Time spent on the photo in milliseconds.
    pub elapsed_ms: u64,
    /// The report, for analyzed photos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a QualityReport>,
    /// The failure, for photos that could not be analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

/// Serialized analysis failure.
#[derive(Debug, Serialize)]
pub struct ErrorRecord {
    /// Stable machine-readable kind.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl<'a> PhotoRecord<'a> {
    /// Builds the record for one result.
    #[must_use]
    pub fn new(result: &'a PhotoResult) -> Self {
        Self {
            photo_id: &result.photo_id,
            analyzed_at: iso_timestamp(),
            status: if result.is_success() { "ok" } else { "failed" },
            elapsed_ms: u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            report: result.report(),
            error: result.error().map(|e| ErrorRecord {
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }
}

/// JSON / JSON Lines report sink.
///
/// JSONL writes each record as it arrives; JSON collects them and writes a
/// single array on flush.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    format: OutputFormat,
    pretty: bool,
    pending: Mutex<Vec<serde_json::Value>>,
}

impl JsonOutput {
    /// Creates a JSON output writing to stdout.
    #[must_use]
    pub fn stdout(format: OutputFormat, pretty: bool) -> Self {
        Self::new(Box::new(io::stdout()), format, pretty)
    }

    /// Creates a JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            format,
            pretty,
            pending: Mutex::new(Vec::new()),
        }
    }

    #[allow(clippy::significant_drop_tightening)]
    fn write_line(&self, json: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{json}")?;
        Ok(())
    }
}

impl ReportSink for JsonOutput {
    fn write(&self, result: &PhotoResult) -> Result<()> {
        let record = PhotoRecord::new(result);
        match self.format {
            OutputFormat::Jsonl => self.write_line(&serde_json::to_string(&record)?),
            OutputFormat::Json => {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(serde_json::to_value(&record)?);
                Ok(())
            }
        }
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        if self.format == OutputFormat::Json {
            let records =
                std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
            debug!("Writing {} records as JSON array", records.len());
            let json = if self.pretty {
                serde_json::to_string_pretty(&records)?
            } else {
                serde_json::to_string(&records)?
            };
            self.write_line(&json)?;
        }
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }
}

/// Generate ISO 8601 UTC timestamp (RFC 3339 format).
fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}
