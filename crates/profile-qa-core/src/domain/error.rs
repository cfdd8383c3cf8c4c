//! Error taxonomy of the analysis engine.

use std::time::Duration;

use thiserror::Error;

/// Why a buffer was rejected before analysis.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Format not detected or not in the accepted set.
    #[error("unsupported or undetectable image format{}", describe_detected(.detected))]
    UnsupportedFormat {
        /// Name of the detected format, if one was recognized at all.
        detected: Option<String>,
    },
    /// Dimensions missing or below the minimum.
    #[error("image too small: {}, minimum is {min}x{min}", describe_dimensions(.dimensions))]
    TooSmall {
        /// Dimensions read from the header, if readable.
        dimensions: Option<(u32, u32)>,
        /// Minimum accepted side length.
        min: u32,
    },
    /// Dimensions or payload exceed the maximum.
    #[error("image too large: {0}")]
    TooLarge(SizeLimit),
}

/// Which upper bound a buffer exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SizeLimit {
    /// A side is longer than allowed.
    #[error("{width}x{height} exceeds {max}px per side")]
    Dimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Maximum side length.
        max: u32,
    },
    /// The encoded payload is too big.
    #[error("{bytes} bytes exceeds {max} bytes")]
    Payload {
        /// Payload size.
        bytes: u64,
        /// Maximum payload size.
        max: u64,
    },
}

fn describe_detected(detected: &Option<String>) -> String {
    detected
        .as_deref()
        .map(|name| format!(" ({name})"))
        .unwrap_or_default()
}

fn describe_dimensions(dimensions: &Option<(u32, u32)>) -> String {
    dimensions.map_or_else(
        || "dimensions unreadable".to_string(),
        |(w, h)| format!("{w}x{h}"),
    )
}

/// Why the analysis of one photo failed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The buffer was rejected by the validator.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The buffer could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    /// Analysis did not finish in time.
    #[error("analysis timed out after {:.1}s", .elapsed.as_secs_f64())]
    Timeout {
        /// Time spent before giving up.
        elapsed: Duration,
    },
    /// The byte source could not supply the buffer.
    #[error("failed to fetch image: {0}")]
    Source(String),
    /// The analysis task died unexpectedly.
    #[error("analysis task failed: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Short machine-readable kind, stable across messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::UnsupportedFormat { .. }) => "unsupported_format",
            Self::Validation(ValidationError::TooSmall { .. }) => "too_small",
            Self::Validation(ValidationError::TooLarge(_)) => "too_large",
            Self::Decode(_) => "decode",
            Self::Timeout { .. } => "timeout",
            Self::Source(_) => "source",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failure of the optional expression classifier.
///
/// Never leaves the expression analyzer; it always turns into the fallback metric.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No classifier is installed or its models failed to load.
    #[error("expression classifier unavailable: {0}")]
    Unavailable(String),
    /// Inference failed for this image.
    #[error("expression inference failed: {0}")]
    Inference(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::TooSmall {
            dimensions: Some((100, 100)),
            min: 200,
        };
        assert_eq!(err.to_string(), "image too small: 100x100, minimum is 200x200");

        let err = ValidationError::TooSmall {
            dimensions: None,
            min: 200,
        };
        assert!(err.to_string().contains("dimensions unreadable"));

        let err = ValidationError::UnsupportedFormat {
            detected: Some("ico".into()),
        };
        assert!(err.to_string().ends_with("(ico)"));
    }

    #[test]
    fn test_error_kinds() {
        let err = AnalysisError::from(ValidationError::TooLarge(SizeLimit::Payload {
            bytes: 11,
            max: 10,
        }));
        assert_eq!(err.kind(), "too_large");
        assert!(err.to_string().contains("11 bytes exceeds 10 bytes"));

        let err = AnalysisError::Timeout {
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(err.kind(), "timeout");
        assert_eq!(err.to_string(), "analysis timed out after 1.5s");
    }
}
