//! Raw image input and the metadata derived from it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Raw encoded image bytes as handed over by a byte source.
///
/// Cloning is cheap: the bytes are shared, never copied or mutated.
#[derive(Clone)]
pub struct ImageBuffer {
    bytes: Arc<[u8]>,
    declared_len: Option<u64>,
}

impl ImageBuffer {
    /// Wraps encoded image bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_len: None,
        }
    }

    /// Records the content length reported by the source (e.g. an HTTP header).
    #[must_use]
    pub fn with_declared_len(mut self, len: u64) -> Self {
        self.declared_len = Some(len);
        self
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of bytes actually held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content length as declared by the source, if any.
    #[must_use]
    pub const fn declared_len(&self) -> Option<u64> {
        self.declared_len
    }

    /// The larger of the declared and the actual length.
    #[must_use]
    pub fn content_len(&self) -> u64 {
        let actual = self.bytes.len() as u64;
        self.declared_len.map_or(actual, |declared| declared.max(actual))
    }

    /// Decodes the full image.
    ///
    /// # Errors
    ///
    /// Returns the decoder error if the bytes are corrupt, truncated or in an
    /// unknown format.
    pub fn decode(&self) -> image::ImageResult<image::DynamicImage> {
        image::load_from_memory(&self.bytes)
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("len", &self.bytes.len())
            .field("declared_len", &self.declared_len)
            .finish()
    }
}

impl From<Vec<u8>> for ImageBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for ImageBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

/// Raster formats accepted by the validator.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG / JFIF.
    Jpeg,
    /// Portable Network Graphics.
    Png,
    /// `WebP` (lossy or lossless).
    WebP,
    /// Graphics Interchange Format.
    Gif,
    /// Windows bitmap.
    Bmp,
    /// Tagged Image File Format.
    Tiff,
}

impl ImageKind {
    /// Every supported kind.
    pub const ALL: [Self; 6] = [
        Self::Jpeg,
        Self::Png,
        Self::WebP,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
    ];

    /// Maps a detected `image` crate format onto a supported kind.
    #[must_use]
    pub const fn from_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::WebP => Some(Self::WebP),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    /// The matching `image` crate format.
    #[must_use]
    pub const fn format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::WebP => image::ImageFormat::WebP,
            Self::Gif => image::ImageFormat::Gif,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        };
        f.write_str(name)
    }
}

/// Header-level facts about a buffer that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedMetadata {
    /// Detected format.
    pub format: ImageKind,
    /// Width in pixels (> 0).
    pub width: u32,
    /// Height in pixels (> 0).
    pub height: u32,
    /// Payload size in bytes.
    pub byte_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_len_prefers_larger_value() {
        let buffer = ImageBuffer::new(vec![0u8; 10]);
        assert_eq!(buffer.content_len(), 10);
        assert_eq!(buffer.clone().with_declared_len(4).content_len(), 10);
        assert_eq!(buffer.with_declared_len(64).content_len(), 64);
    }

    #[test]
    fn test_clone_shares_bytes() {
        let buffer = ImageBuffer::from(vec![1u8, 2, 3]);
        let other = buffer.clone();
        assert_eq!(buffer.bytes().as_ptr(), other.bytes().as_ptr());
    }

    #[test]
    fn test_kind_round_trips_through_format() {
        for kind in ImageKind::ALL {
            assert_eq!(ImageKind::from_format(kind.format()), Some(kind));
        }
        assert_eq!(ImageKind::from_format(image::ImageFormat::Ico), None);
    }
}
