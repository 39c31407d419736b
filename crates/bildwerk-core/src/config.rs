// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one image session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Reject a whole ingest batch when any item in it is invalid.
    /// Default is the lenient policy: invalid items are dropped and reported
    /// in one aggregate warning while their siblings are admitted.
    pub strict_ingest: bool,
    /// Longest edge of generated preview thumbnails, in pixels.
    pub preview_max_dimension: u32,
    /// Paper size for the assembled document.
    pub paper_size: crate::PaperSize,
    /// Image placement DPI used by the assembler.
    pub assembly_dpi: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strict_ingest: false,
            preview_max_dimension: 256,
            paper_size: crate::PaperSize::A4,
            assembly_dpi: 150.0,
        }
    }
}
