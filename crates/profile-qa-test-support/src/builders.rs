//! Synthetic image builders for testing.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use profile_qa_core::ImageBuffer;

/// Builder for synthetic test images and their encoded buffers.
///
/// Image constructors return a [`DynamicImage`]; [`png`](Self::png) and
/// [`jpeg`](Self::jpeg) turn one into the [`ImageBuffer`] the engine takes.
pub struct SyntheticImageBuilder;

impl SyntheticImageBuilder {
    // === Sharp images ===

    /// Black and white checkerboard with 8px cells (very sharp).
    #[must_use]
    pub fn checkerboard(width: u32, height: u32) -> DynamicImage {
        Self::checkerboard_with_cell_size(width, height, 8)
    }

    /// Checkerboard with a custom cell size.
    #[must_use]
    pub fn checkerboard_with_cell_size(width: u32, height: u32, cell_size: u32) -> DynamicImage {
        let cell = cell_size.max(1);
        Self::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        })
    }

    /// Alternating black and white vertical bars.
    #[must_use]
    pub fn vertical_bars(width: u32, height: u32, bar_width: u32) -> DynamicImage {
        let bar = bar_width.max(1);
        Self::from_fn(width, height, |x, _| {
            if (x / bar) % 2 == 0 {
                [255, 255, 255]
            } else {
                [0, 0, 0]
            }
        })
    }

    /// Sharp checkerboard in the middle, flat gray around it.
    #[must_use]
    pub fn sharp_center_blurry_edges(width: u32, height: u32) -> DynamicImage {
        let (cx, cy) = (width / 2, height / 2);
        let radius = width.min(height) / 4;
        Self::from_fn(width, height, |x, y| {
            if x.abs_diff(cx).max(y.abs_diff(cy)) < radius {
                if (x / 4 + y / 4) % 2 == 0 {
                    [255, 255, 255]
                } else {
                    [0, 0, 0]
                }
            } else {
                [128, 128, 128]
            }
        })
    }

    /// Deterministic mid-tone noise, a stand-in for textured photo content.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn noise(width: u32, height: u32, seed: u32) -> DynamicImage {
        Self::from_fn(width, height, |x, y| {
            let mut h = seed ^ x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
            h ^= h >> 15;
            h = h.wrapping_mul(0x2C1B_3C6D);
            h ^= h >> 12;
            let v = 60 + (h % 140) as u8;
            [v, v, v]
        })
    }

    // === Flat images ===

    /// Single gray level everywhere (no edges, no contrast).
    #[must_use]
    pub fn uniform_gray(width: u32, height: u32, value: u8) -> DynamicImage {
        Self::uniform_rgb(width, height, [value; 3])
    }

    /// Single colour everywhere.
    #[must_use]
    pub fn uniform_rgb(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    /// Left-to-right ramp from `from` to `to`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn horizontal_gradient(width: u32, height: u32, from: u8, to: u8) -> DynamicImage {
        let span = i64::from(to) - i64::from(from);
        let w = i64::from(width.max(1));
        Self::from_fn(width, height, |x, _| {
            let v = (i64::from(from) + span * i64::from(x) / w) as u8;
            [v, v, v]
        })
    }

    fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| Rgb(f(x, y))))
    }

    // === Encoding ===

    /// Encodes an image as PNG.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn png(image: &DynamicImage) -> ImageBuffer {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("PNG encoding into memory");
        ImageBuffer::new(bytes)
    }

    /// Encodes an image as JPEG at the given quality (1-100).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn jpeg(image: &DynamicImage, quality: u8) -> ImageBuffer {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
            .expect("JPEG encoding into memory");
        ImageBuffer::new(bytes)
    }

    // === Ready-made buffers ===

    /// 300x300 mid-gray PNG.
    #[must_use]
    pub fn mid_gray() -> ImageBuffer {
        Self::png(&Self::uniform_gray(300, 300, 128))
    }

    /// 400x400 checkerboard PNG.
    #[must_use]
    pub fn sharp_photo() -> ImageBuffer {
        Self::png(&Self::checkerboard(400, 400))
    }

    /// PNG of the given size, content irrelevant.
    #[must_use]
    pub fn sized(width: u32, height: u32) -> ImageBuffer {
        Self::png(&Self::uniform_gray(width, height, 100))
    }

    /// Bytes that match no image format.
    #[must_use]
    pub fn corrupt() -> ImageBuffer {
        ImageBuffer::from(b"this is not an image, just some text".as_slice())
    }
}
