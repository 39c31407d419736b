// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Ingest errors --
    #[error("ingest rejected: {0}")]
    IngestRejected(String),

    // -- Pipeline errors --
    #[error("image enhancement failed: {0}")]
    Enhancement(String),

    // -- Assembly errors --
    #[error("document assembly failed: {0}")]
    Assembly(String),

    #[error("cannot assemble: {0}")]
    Precondition(String),

    // -- Image / document processing --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- I/O --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
