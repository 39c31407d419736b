// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-document — the concrete image and document capabilities behind
// the session's enhancement and assembly seams.
//
// Provides in-memory image processing (scaling, sharpening, contrast), the
// Lanczos upscaling transform applied to pasted images, and multi-page PDF
// assembly of the ready set.

pub mod assembler;
pub mod processor;
pub mod upscaler;

pub use assembler::PdfAssembler;
pub use processor::ImageProcessor;
pub use upscaler::LanczosUpscaler;
