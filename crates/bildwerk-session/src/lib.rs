// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-session — the coordination core of Bildwerk.
//
// Owns the per-image lifecycle: ingest (file picker, drag-drop, clipboard
// paste), the resource ledger for preview handles, the concurrent
// enhancement pipeline for pasted images, and the assembly trigger over the
// ready subset.

pub mod collection;
pub mod ingest;
pub mod ledger;
pub mod pipeline;
pub mod session;

pub use collection::{CollectionSnapshot, ImageCollection, ImageView, ManagedImage};
pub use ingest::{IngestReport, RawIngestItem};
pub use ledger::{PreviewHandle, PreviewImage, ResourceLedger};
pub use pipeline::EnhancementPipeline;
pub use session::{Session, SessionState};

#[cfg(test)]
pub(crate) mod testutil;
