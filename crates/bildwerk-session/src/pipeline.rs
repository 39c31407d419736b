// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Enhancement pipeline — one independent tokio task per submitted image.
//
// Only the image id crosses the await point; the completion re-resolves the
// item by id under the state lock. An item removed mid-flight therefore
// turns its completion into a no-op instead of a dangling write, and the
// freshly created preview handle is reclaimed on that path so the ledger's
// handle count stays paired. There is no ordering guarantee between
// concurrently submitted items and no concurrency limit here — backpressure,
// if any, belongs to the enhancer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bildwerk_core::capability::Enhancer;
use bildwerk_core::types::ImageId;

use crate::session::SessionState;

/// Decrements the in-flight gauge when a task finishes, on every exit path
/// including an unwinding enhancer.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives the external enhancement transform for pasted images.
pub struct EnhancementPipeline<E: Enhancer + 'static> {
    enhancer: Arc<E>,
    state: Arc<Mutex<SessionState>>,
    preview_max_dimension: u32,
    in_flight: Arc<AtomicUsize>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<E: Enhancer + 'static> EnhancementPipeline<E> {
    pub fn new(
        enhancer: E,
        state: Arc<Mutex<SessionState>>,
        preview_max_dimension: u32,
    ) -> Self {
        Self {
            enhancer: Arc::new(enhancer),
            state,
            preview_max_dimension,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Submit one just-admitted item (already in `Upscaling`) for
    /// enhancement. Spawns an independent task; returns immediately.
    pub fn submit(&self, id: ImageId) {
        let payload = {
            let state = self.state.lock().expect("session state lock poisoned");
            state.collection.payload_of(id)
        };
        let Some(payload) = payload else {
            warn!(%id, "submit for an image that is not in the collection");
            return;
        };

        debug!(%id, bytes = payload.len(), "enhancement submitted");
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let enhancer = Arc::clone(&self.enhancer);
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        let max_dim = self.preview_max_dimension;

        let task = tokio::spawn(async move {
            let _in_flight = InFlightGuard(in_flight);
            let outcome = enhancer.enhance(payload).await;

            let mut state = state.lock().expect("session state lock poisoned");
            match outcome {
                Ok(enhanced) => match state.ledger.create_preview(&enhanced, max_dim) {
                    Ok(handle) => match state.collection.apply_enhancement(id, enhanced, handle) {
                        Ok(superseded) => {
                            state.ledger.reclaim(superseded);
                            info!(%id, "enhancement applied");
                        }
                        Err(unused) => {
                            // Stale completion — the item is gone or terminal.
                            state.ledger.reclaim(unused);
                            debug!(%id, "stale enhancement completion discarded");
                        }
                    },
                    Err(err) => {
                        // The transform returned bytes we cannot preview.
                        if state.collection.mark_failed(id, err.to_string()) {
                            warn!(%id, error = %err, "enhancement produced unusable output");
                        }
                    }
                },
                Err(err) => {
                    if state.collection.mark_failed(id, err.to_string()) {
                        warn!(%id, error = %err, "enhancement failed");
                    } else {
                        debug!(%id, "stale enhancement failure discarded");
                    }
                }
            }
        });

        self.tasks
            .lock()
            .expect("pipeline task list lock poisoned")
            .push(task);
    }

    /// Await every task spawned so far. Used by teardown and tests; the
    /// interactive path never blocks on this.
    pub async fn settle(&self) {
        let drained: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("pipeline task list lock poisoned");
            tasks.drain(..).collect()
        };
        for task in drained {
            // A panicking enhancer task only loses that one item.
            if let Err(err) = task.await {
                warn!(error = %err, "enhancement task aborted");
            }
        }
    }

    /// Number of transforms currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
