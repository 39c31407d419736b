// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The ordered, mutable set of managed image entries — single source of truth
// for rendering and document assembly.
//
// Order is insertion order and is never implicitly changed; removal keeps
// the relative order of the remaining items. Every mutation bumps a
// generation counter so observers can detect change by comparing a single
// integer instead of diffing the contents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use bildwerk_core::capability::ImagePayload;
use bildwerk_core::types::{HandleId, ImageId, ImageKind, ImageStatus, IngestSource};

use crate::ledger::PreviewHandle;

/// One admitted image and its lifecycle state.
///
/// Not `Clone`: the preview handle inside is an affine token owned by
/// exactly this entry. Observers work from [`ImageView`] snapshots instead.
#[derive(Debug)]
pub struct ManagedImage {
    /// Stable identifier, generated at admission.
    pub id: ImageId,
    /// Display name — original filename, or synthesised for pasted items.
    pub name: String,
    /// Which entry point admitted the item.
    pub source: IngestSource,
    /// Current binary payload. Replaced in place when an enhancement
    /// completes successfully; otherwise unchanged for the item's lifetime.
    pub content: Vec<u8>,
    /// Declared media kind of `content`.
    pub kind: ImageKind,
    /// The one live preview handle for this entry.
    pub preview: PreviewHandle,
    /// Lifecycle status.
    pub status: ImageStatus,
    /// Present only when `status` is `Error`.
    pub error_detail: Option<String>,
    /// When the item was admitted.
    pub admitted_at: DateTime<Utc>,
}

impl ManagedImage {
    pub fn new(
        name: String,
        source: IngestSource,
        payload: ImagePayload,
        preview: PreviewHandle,
        status: ImageStatus,
    ) -> Self {
        Self {
            id: ImageId::new(),
            name,
            source,
            content: payload.bytes,
            kind: payload.kind,
            preview,
            status,
            error_detail: None,
            admitted_at: Utc::now(),
        }
    }

    /// Clone the current payload (bytes + kind).
    pub fn payload(&self) -> ImagePayload {
        ImagePayload::new(self.content.clone(), self.kind)
    }
}

/// Clonable per-item view for observers (UI lists, banners).
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: ImageId,
    pub name: String,
    pub source: IngestSource,
    pub kind: ImageKind,
    pub status: ImageStatus,
    pub error_detail: Option<String>,
    pub preview: HandleId,
    pub admitted_at: DateTime<Utc>,
}

/// A point-in-time view of the whole collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSnapshot {
    pub images: Vec<ImageView>,
    pub generation: u64,
}

/// The ordered collection of managed images.
#[derive(Debug, Default)]
pub struct ImageCollection {
    images: Vec<ManagedImage>,
    generation: u64,
}

impl ImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Mutations ------------------------------------------------------------

    /// Append a batch of admitted items in arrival order.
    pub fn admit(&mut self, items: Vec<ManagedImage>) {
        if items.is_empty() {
            return;
        }
        info!(count = items.len(), "admitting images");
        self.images.extend(items);
        self.generation += 1;
    }

    /// Remove one item, handing its entry (and the preview handle inside)
    /// back to the caller for ledger reclamation. Returns `None` when the id
    /// is unknown.
    pub fn remove(&mut self, id: ImageId) -> Option<ManagedImage> {
        let pos = self.images.iter().position(|img| img.id == id)?;
        let removed = self.images.remove(pos);
        self.generation += 1;
        info!(%id, remaining = self.images.len(), "image removed");
        Some(removed)
    }

    /// Drain every item, handing them back for bulk reclamation.
    pub fn clear(&mut self) -> Vec<ManagedImage> {
        if self.images.is_empty() {
            return Vec::new();
        }
        self.generation += 1;
        info!(count = self.images.len(), "collection cleared");
        std::mem::take(&mut self.images)
    }

    /// Apply a mutation to the item with the given id.
    ///
    /// The mutator decides whether anything changed: returning `Some`
    /// commits and advances the generation, returning `None` declines and
    /// leaves it alone. A missing id is likewise a no-op — expected when the
    /// item was removed while an asynchronous operation on it was still in
    /// flight. Both transition helpers below route through here.
    pub fn update_by_id<T>(
        &mut self,
        id: ImageId,
        mutator: impl FnOnce(&mut ManagedImage) -> Option<T>,
    ) -> Option<T> {
        let img = self.images.iter_mut().find(|img| img.id == id)?;
        let out = mutator(img)?;
        self.generation += 1;
        Some(out)
    }

    /// Swap in an enhanced payload for `id`: content, kind, preview handle,
    /// and `status → Ready`, atomically with respect to other items.
    ///
    /// Returns `Ok(superseded_handle)` for the caller to reclaim, or gives
    /// `new_handle` back as `Err` when the item is gone or already terminal
    /// (a stale completion — the caller reclaims the unused handle instead).
    pub fn apply_enhancement(
        &mut self,
        id: ImageId,
        payload: ImagePayload,
        new_handle: PreviewHandle,
    ) -> std::result::Result<PreviewHandle, PreviewHandle> {
        // The slot hands the unused handle back out when the update declines.
        let mut slot = Some((payload, new_handle));
        let applied = self.update_by_id(id, |img| {
            if img.status != ImageStatus::Upscaling {
                warn!(%id, status = ?img.status, "enhancement completion for a terminal image ignored");
                return None;
            }
            let (payload, new_handle) = slot.take().expect("mutator runs at most once");
            img.content = payload.bytes;
            img.kind = payload.kind;
            img.status = ImageStatus::Ready;
            Some(std::mem::replace(&mut img.preview, new_handle))
        });

        match applied {
            Some(superseded) => {
                info!(%id, "image enhanced and marked ready");
                Ok(superseded)
            }
            None => {
                debug!(%id, "stale enhancement completion discarded");
                let (_, new_handle) = slot.take().expect("declined update leaves the input");
                Err(new_handle)
            }
        }
    }

    /// Record an enhancement failure for `id`: `status → Error` with a
    /// human-readable detail. Content and preview are left untouched so the
    /// original stays visible. Returns `false` on a stale completion.
    pub fn mark_failed(&mut self, id: ImageId, detail: String) -> bool {
        let mut detail = Some(detail);
        let marked = self.update_by_id(id, |img| {
            if img.status != ImageStatus::Upscaling {
                warn!(%id, status = ?img.status, "enhancement failure for a terminal image ignored");
                return None;
            }
            img.status = ImageStatus::Error;
            img.error_detail = detail.take();
            Some(())
        });

        match marked {
            Some(()) => {
                info!(%id, "image marked failed");
                true
            }
            None => {
                debug!(%id, "enhancement failure for a missing or terminal image");
                false
            }
        }
    }

    // -- Queries --------------------------------------------------------------

    pub fn get(&self, id: ImageId) -> Option<&ManagedImage> {
        self.images.iter().find(|img| img.id == id)
    }

    /// Clone the current payload of one item.
    pub fn payload_of(&self, id: ImageId) -> Option<ImagePayload> {
        self.get(id).map(ManagedImage::payload)
    }

    /// Payloads of every `Ready` item, in collection order. `Upscaling` and
    /// `Error` items are excluded, never partially included.
    pub fn ready_payloads(&self) -> Vec<ImagePayload> {
        self.images
            .iter()
            .filter(|img| img.status == ImageStatus::Ready)
            .map(ManagedImage::payload)
            .collect()
    }

    pub fn upscaling_count(&self) -> usize {
        self.images
            .iter()
            .filter(|img| img.status == ImageStatus::Upscaling)
            .count()
    }

    pub fn any_upscaling(&self) -> bool {
        self.upscaling_count() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Bumped on every mutation; observers compare generations to detect
    /// change without diffing.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        CollectionSnapshot {
            images: self
                .images
                .iter()
                .map(|img| ImageView {
                    id: img.id,
                    name: img.name.clone(),
                    source: img.source,
                    kind: img.kind,
                    status: img.status,
                    error_detail: img.error_detail.clone(),
                    preview: img.preview.id(),
                    admitted_at: img.admitted_at,
                })
                .collect(),
            generation: self.generation,
        }
    }
}
