// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ingest normalisation — turns heterogeneous raw input (file picker list,
// drop payload, clipboard data) into admissible collection entries.
//
// All three entry points share one contract: filter to items whose declared
// media kind is a supported image, aggregate rejections into one per-batch
// warning, and never let a bad item block its valid siblings. The whole
// batch is built before anything is admitted, so the strict policy can
// reject it without side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bildwerk_core::capability::ImagePayload;
use bildwerk_core::config::SessionConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{ImageId, ImageKind, ImageStatus, IngestSource};

use crate::collection::ManagedImage;
use crate::ledger::ResourceLedger;

/// One raw input item before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIngestItem {
    /// Original filename, when the source provides one (files, drops).
    /// Clipboard items usually arrive nameless.
    pub name: Option<String>,
    /// Declared MIME type, e.g. `image/png`.
    pub media_kind: Option<String>,
    /// Raw encoded bytes.
    pub bytes: Vec<u8>,
}

impl RawIngestItem {
    pub fn new(
        name: impl Into<Option<String>>,
        media_kind: impl Into<Option<String>>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_kind: media_kind.into(),
            bytes,
        }
    }
}

/// Outcome of one ingest batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Ids of the admitted items, in arrival order.
    pub admitted: Vec<ImageId>,
    /// Labels of the rejected items with their reasons.
    pub rejected: Vec<String>,
    /// One aggregate user-visible warning for the batch, if anything was
    /// rejected.
    pub warning: Option<String>,
}

/// Build the admissible entries for one batch.
///
/// Returns the entries (each with a fresh id and a fresh preview handle)
/// plus the rejection labels. Under `strict_ingest`, any rejection unwinds
/// the handles already created and fails the whole batch.
pub(crate) fn build_batch(
    source: IngestSource,
    items: Vec<RawIngestItem>,
    config: &SessionConfig,
    ledger: &mut ResourceLedger,
    batch_at: DateTime<Utc>,
) -> Result<(Vec<ManagedImage>, Vec<String>)> {
    let mut batch: Vec<ManagedImage> = Vec::with_capacity(items.len());
    let mut rejected: Vec<String> = Vec::new();

    let status = match source {
        // Pasted items go through the enhancement transform first.
        IngestSource::Clipboard => ImageStatus::Upscaling,
        IngestSource::FilePicker | IngestSource::DragDrop => ImageStatus::Ready,
    };

    for (index, item) in items.into_iter().enumerate() {
        let label = item
            .name
            .clone()
            .unwrap_or_else(|| format!("clipboard item {}", index + 1));

        let kind = match classify(&item) {
            Some(kind) => kind,
            None => {
                debug!(label, kind = ?item.media_kind, "ingest item is not a supported image");
                rejected.push(format!("{label} (not a supported image)"));
                continue;
            }
        };

        let payload = ImagePayload::new(item.bytes, kind);
        let handle = match ledger.create_preview(&payload, config.preview_max_dimension) {
            Ok(handle) => handle,
            Err(err) => {
                debug!(label, error = %err, "ingest item has no usable image data");
                rejected.push(format!("{label} (unreadable image data)"));
                continue;
            }
        };

        // Pasted items always get a synthetic name, even when the clipboard
        // supplies one: two pastes of the same file must not collide.
        let name = match source {
            IngestSource::Clipboard => synthetic_clipboard_name(batch_at, index, kind),
            IngestSource::FilePicker | IngestSource::DragDrop => item
                .name
                .unwrap_or_else(|| synthetic_clipboard_name(batch_at, index, kind)),
        };

        batch.push(ManagedImage::new(name, source, payload, handle, status));
    }

    if config.strict_ingest && !rejected.is_empty() {
        warn!(
            rejected = rejected.len(),
            "strict ingest: rejecting the whole batch"
        );
        for entry in batch {
            ledger.reclaim(entry.preview);
        }
        return Err(BildwerkError::IngestRejected(rejected.join(", ")));
    }

    Ok((batch, rejected))
}

/// Map a raw item to a supported image kind, falling back from the declared
/// MIME type to the filename extension.
fn classify(item: &RawIngestItem) -> Option<ImageKind> {
    if let Some(mime) = item.media_kind.as_deref() {
        return ImageKind::from_mime(mime);
    }
    let name = item.name.as_deref()?;
    let (_, ext) = name.rsplit_once('.')?;
    ImageKind::from_extension(ext)
}

/// Synthesise a collision-free filename for a pasted item from the batch
/// timestamp and the item's position within the batch.
fn synthetic_clipboard_name(batch_at: DateTime<Utc>, index: usize, kind: ImageKind) -> String {
    format!(
        "paste-{}-{}.{}",
        batch_at.format("%Y%m%d-%H%M%S"),
        index + 1,
        kind.extension()
    )
}

/// One aggregate warning line for a batch, or `None` when nothing was
/// rejected.
pub(crate) fn aggregate_warning(rejected: &[String]) -> Option<String> {
    if rejected.is_empty() {
        return None;
    }
    Some(format!(
        "{} item(s) were skipped: {}",
        rejected.len(),
        rejected.join(", ")
    ))
}
