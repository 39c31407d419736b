// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resource ledger — tracks ownership of preview handles so each one is
// released exactly once.
//
// A `PreviewHandle` is an affine token: it has no `Clone` or `Copy`, it is
// created only by `create_preview`, and `reclaim` consumes it by value.
// Double-reclaim is therefore a move-after-move compile error rather than a
// runtime bug class. Every code path that supersedes or destroys a managed
// image moves its handle into `reclaim` — removal, clear, content
// replacement on a successful enhancement, and session teardown.

use std::collections::HashMap;

use image::imageops::FilterType;
use tracing::{debug, instrument, warn};

use bildwerk_core::capability::ImagePayload;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::HandleId;

/// Ownership token referencing one renderable preview in the ledger.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: HandleId,
}

impl PreviewHandle {
    /// The id this handle names. Copyable and safe to hand to observers;
    /// rendering via a stale id simply yields `None`.
    pub fn id(&self) -> HandleId {
        self.id
    }
}

/// A decoded RGBA8 thumbnail — the renderable view behind a handle.
#[derive(Debug, Clone)]
pub struct PreviewImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 pixel data, row-major.
    pub pixels: Vec<u8>,
}

/// Tracks every live preview and the pairing of creations to reclaims.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    previews: HashMap<HandleId, PreviewImage>,
    created: u64,
    reclaimed: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a payload into a thumbnail no larger than `max_dim` on its
    /// longest edge and register it, returning the owning handle.
    ///
    /// Fails when the bytes are not decodable as the declared kind — an
    /// ingest-time rejection for items that arrived without a usable blob.
    #[instrument(skip(self, payload), fields(kind = ?payload.kind, bytes = payload.len()))]
    pub fn create_preview(&mut self, payload: &ImagePayload, max_dim: u32) -> Result<PreviewHandle> {
        let decoded = image::load_from_memory(&payload.bytes).map_err(|err| {
            BildwerkError::ImageError(format!("failed to decode preview image: {err}"))
        })?;

        let thumb = if decoded.width() > max_dim || decoded.height() > max_dim {
            decoded.resize(max_dim, max_dim, FilterType::Lanczos3)
        } else {
            decoded
        };

        let rgba = thumb.to_rgba8();
        let preview = PreviewImage {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        };

        let id = HandleId::new();
        self.previews.insert(id, preview);
        self.created += 1;

        debug!(%id, live = self.previews.len(), "preview handle created");
        Ok(PreviewHandle { id })
    }

    /// Release a handle, dropping its stored preview. Consumes the token.
    pub fn reclaim(&mut self, handle: PreviewHandle) {
        self.reclaimed += 1;
        if self.previews.remove(&handle.id).is_none() {
            // Unreachable unless a handle from a different ledger was passed in.
            warn!(id = %handle.id, "reclaimed a handle this ledger does not hold");
        } else {
            debug!(id = %handle.id, live = self.previews.len(), "preview handle reclaimed");
        }
    }

    /// Look up the renderable preview behind a handle id.
    pub fn preview(&self, id: HandleId) -> Option<&PreviewImage> {
        self.previews.get(&id)
    }

    /// Number of currently live handles.
    pub fn live_handles(&self) -> usize {
        self.previews.len()
    }

    /// Total handles ever created.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Total handles reclaimed.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed
    }
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        if !self.previews.is_empty() {
            warn!(
                live = self.previews.len(),
                created = self.created,
                reclaimed = self.reclaimed,
                "resource ledger dropped with live preview handles"
            );
        }
    }
}
