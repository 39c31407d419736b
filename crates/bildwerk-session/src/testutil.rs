// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared helpers for the crate's test modules.

use bildwerk_core::{ImageKind, ImagePayload};
use image::{DynamicImage, Rgba, RgbaImage};

/// Encode a `width` x `height` solid-colour PNG payload.
pub(crate) fn png_payload_sized(width: u32, height: u32, color: [u8; 4]) -> ImagePayload {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encode test PNG");
    ImagePayload::new(bytes, ImageKind::Png)
}

/// Encode a small solid-colour PNG payload. Distinct colours give distinct
/// bytes, which tests use to track items through the pipeline.
pub(crate) fn png_payload(color: [u8; 4]) -> ImagePayload {
    png_payload_sized(4, 4, color)
}

/// Install the test tracing subscriber (idempotent).
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
