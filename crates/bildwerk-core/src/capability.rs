// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait seams for the two external capabilities the session coordinates:
// per-image enhancement and whole-document assembly. Concrete
// implementations live in `bildwerk-document`; tests substitute stubs.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ImageKind;

/// One image payload crossing a capability boundary: raw encoded bytes plus
/// the declared media kind. No format contract beyond "image-like" is
/// assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, kind: ImageKind) -> Self {
        Self { bytes, kind }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-image enhancement transform.
///
/// Invoked once per submitted item, independently and concurrently. The
/// output kind may differ from the input kind. A failure is scoped to the
/// one item it was invoked for.
pub trait Enhancer: Send + Sync {
    fn enhance(&self, payload: ImagePayload) -> impl Future<Output = Result<ImagePayload>> + Send;
}

/// Whole-document assembly over an ordered sequence of image payloads.
///
/// Produces one binary document artifact or fails with a human-readable
/// message. Page sizing and orientation policy per image is internal to the
/// implementation.
pub trait Assembler: Send + Sync {
    fn assemble(&self, pages: Vec<ImagePayload>) -> impl Future<Output = Result<Vec<u8>>> + Send;
}
