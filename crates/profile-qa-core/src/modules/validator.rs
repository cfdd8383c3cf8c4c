//! Format and dimension gatekeeping.
//!
//! Only the image header is read; nothing is decoded.

use std::io::Cursor;

use tracing::debug;

use crate::domain::{DecodedMetadata, ImageBuffer, ImageKind, SizeLimit, ValidationError};

/// Limits applied to incoming buffers.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Minimum width and height in pixels.
    pub min_dimension: u32,
    /// Maximum width and height in pixels.
    pub max_dimension: u32,
    /// Maximum encoded payload size in bytes.
    pub max_bytes: u64,
}

impl ValidationConfig {
    /// Default minimum side length.
    pub const DEFAULT_MIN_DIMENSION: u32 = 200;
    /// Default maximum side length.
    pub const DEFAULT_MAX_DIMENSION: u32 = 4000;
    /// Default payload limit (10 MiB).
    pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }
}

/// Checks that a buffer is a supported image of acceptable size.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Creates a validator with the given limits.
    #[must_use]
    pub const fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a buffer, returning its header metadata.
    ///
    /// Rules are applied in order and the first failure wins: format,
    /// minimum dimensions, maximum dimensions, payload size.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] the buffer triggers.
    pub fn validate(&self, buffer: &ImageBuffer) -> Result<DecodedMetadata, ValidationError> {
        let format = detect_kind(buffer.bytes())?;

        let min = self.config.min_dimension;
        let dimensions = image::ImageReader::with_format(Cursor::new(buffer.bytes()), format.format())
            .into_dimensions()
            .inspect_err(|e| debug!("Unreadable {format} header: {e}"))
            .ok()
            .filter(|&(w, h)| w > 0 && h > 0);

        let (width, height) = match dimensions {
            Some((w, h)) if w >= min && h >= min => (w, h),
            // Header-only prefix of an oversized file; its size is the only
            // thing we know to be wrong.
            None if self.is_oversized_prefix(buffer) => return Err(self.payload_error(buffer)),
            other => return Err(ValidationError::TooSmall { dimensions: other, min }),
        };

        let max = self.config.max_dimension;
        if width > max || height > max {
            return Err(ValidationError::TooLarge(SizeLimit::Dimensions {
                width,
                height,
                max,
            }));
        }

        let byte_size = buffer.content_len();
        if byte_size > self.config.max_bytes {
            return Err(self.payload_error(buffer));
        }

        Ok(DecodedMetadata {
            format,
            width,
            height,
            byte_size,
        })
    }

    fn is_oversized_prefix(&self, buffer: &ImageBuffer) -> bool {
        let content_len = buffer.content_len();
        content_len > buffer.len() as u64 && content_len > self.config.max_bytes
    }

    fn payload_error(&self, buffer: &ImageBuffer) -> ValidationError {
        ValidationError::TooLarge(SizeLimit::Payload {
            bytes: buffer.content_len(),
            max: self.config.max_bytes,
        })
    }
}

/// Detects the format from magic bytes.
fn detect_kind(bytes: &[u8]) -> Result<ImageKind, ValidationError> {
    let format = image::guess_format(bytes)
        .map_err(|_| ValidationError::UnsupportedFormat { detected: None })?;

    ImageKind::from_format(format).ok_or_else(|| ValidationError::UnsupportedFormat {
        detected: Some(format.extensions_str().first().map_or_else(
            || format!("{format:?}").to_lowercase(),
            |ext| (*ext).to_string(),
        )),
    })
}
