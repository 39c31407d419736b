// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lanczos upscaler — the enhancement transform applied to pasted images.
//
// Pasted bitmaps are typically screen-resolution crops; the transform
// upscales them by a fixed factor, sharpens, and applies a mild contrast
// boost so they hold up at print density. The pixel work runs on the
// blocking pool to keep the runtime's async workers free.

use std::future::Future;

use tracing::{debug, instrument};

use bildwerk_core::capability::{Enhancer, ImagePayload};
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::ImageKind;

use crate::processor::ImageProcessor;

/// CPU-bound enhancement transform for pasted images.
#[derive(Debug, Clone)]
pub struct LanczosUpscaler {
    /// Linear scale factor applied to both dimensions.
    factor: f32,
    /// Whether to run the sharpening convolution after scaling.
    sharpen: bool,
    /// Contrast factor applied last (1.0 disables).
    contrast: f32,
    /// Upper bound on either output dimension; inputs that would exceed it
    /// are rejected before any pixel work.
    max_output_dimension: u32,
}

impl Default for LanczosUpscaler {
    fn default() -> Self {
        Self {
            factor: 2.0,
            sharpen: true,
            contrast: 1.08,
            max_output_dimension: 8192,
        }
    }
}

impl LanczosUpscaler {
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            ..Self::default()
        }
    }

    pub fn with_sharpen(mut self, sharpen: bool) -> Self {
        self.sharpen = sharpen;
        self
    }

    pub fn with_contrast(mut self, contrast: f32) -> Self {
        self.contrast = contrast;
        self
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// The synchronous transform body. Runs on the blocking pool.
    #[instrument(skip(self, payload), fields(bytes = payload.len(), factor = self.factor))]
    fn transform(&self, payload: ImagePayload) -> Result<ImagePayload> {
        let processor = ImageProcessor::from_bytes(&payload.bytes)
            .map_err(|err| BildwerkError::Enhancement(err.to_string()))?;

        let out_w = (processor.width() as f32 * self.factor).round() as u32;
        let out_h = (processor.height() as f32 * self.factor).round() as u32;
        if out_w.max(out_h) > self.max_output_dimension {
            return Err(BildwerkError::Enhancement(format!(
                "upscaled size {out_w}x{out_h} exceeds the {} pixel limit",
                self.max_output_dimension
            )));
        }

        let mut processor = processor.scale_by(self.factor);
        if self.sharpen {
            processor = processor.sharpen();
        }
        let processor = processor.adjust_contrast(self.contrast);

        let bytes = processor
            .to_png_bytes()
            .map_err(|err| BildwerkError::Enhancement(err.to_string()))?;
        debug!(out_w, out_h, bytes = bytes.len(), "upscale complete");
        Ok(ImagePayload::new(bytes, ImageKind::Png))
    }
}

impl Enhancer for LanczosUpscaler {
    fn enhance(&self, payload: ImagePayload) -> impl Future<Output = Result<ImagePayload>> + Send {
        let upscaler = self.clone();
        async move {
            tokio::task::spawn_blocking(move || upscaler.transform(payload))
                .await
                .map_err(|err| {
                    BildwerkError::Enhancement(format!("enhancement task aborted: {err}"))
                })?
        }
    }
}
