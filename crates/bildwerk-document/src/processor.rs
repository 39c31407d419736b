// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — scaling, sharpening, and contrast adjustment on
// in-memory images, using the `image` and `imageproc` crates.

use image::{DynamicImage, ImageFormat};
use imageproc::filter::filter3x3;
use tracing::{debug, instrument};

use bildwerk_core::error::{BildwerkError, Result};

/// 3x3 sharpening kernel (centre-weighted Laplacian).
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Image processing pipeline operating on a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and
/// returns a new `ImageProcessor` wrapping the transformed image, enabling
/// method chaining.
///
/// ```ignore
/// let bytes = ImageProcessor::from_bytes(&input)?
///     .scale_by(2.0)
///     .sharpen()
///     .adjust_contrast(1.1)
///     .to_png_bytes()?;
/// ```
#[derive(Debug)]
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (PNG, JPEG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| BildwerkError::ImageError(format!("failed to decode image: {err}")))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Scale both dimensions by `factor` using Lanczos3 filtering. Factors
    /// at or below zero and the identity factor are no-ops.
    #[instrument(skip(self), fields(factor))]
    pub fn scale_by(self, factor: f32) -> Self {
        if factor <= 0.0 || (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        let new_w = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let new_h = ((self.image.height() as f32 * factor).round() as u32).max(1);
        debug!(new_w, new_h, "scaling image");
        let scaled =
            self.image
                .resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);
        Self { image: scaled }
    }

    /// Resize the image to fit within `max_width` x `max_height`, preserving
    /// aspect ratio. Never upscales.
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        let resized = self
            .image
            .resize(max_width, max_height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Apply a 3x3 sharpening convolution.
    #[instrument(skip(self))]
    pub fn sharpen(self) -> Self {
        let rgb = self.image.to_rgb8();
        let sharpened: image::RgbImage =
            filter3x3::<image::Rgb<u8>, f32, u8>(&rgb, &SHARPEN_KERNEL);
        Self {
            image: DynamicImage::ImageRgb8(sharpened),
        }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        let rgba = self.image.to_rgba8();
        let contrasted = image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let adjust = |channel: u8| -> u8 {
                let val = factor * (channel as f32 - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            image::Rgba([adjust(r), adjust(g), adjust(b), a])
        });
        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| BildwerkError::ImageError(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| BildwerkError::ImageError(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}
