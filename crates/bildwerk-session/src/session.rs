// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session facade — wires the collection, ledger, and enhancement pipeline
// together behind the narrow admit/remove/clear/assemble surface.
//
// All shared state lives behind one `Arc<Mutex<SessionState>>`. The lock is
// never held across an await point: the two suspension points (enhancement
// transforms, document assembly) run against cloned payloads and re-resolve
// items by id when they settle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};

use bildwerk_core::capability::{Assembler, Enhancer};
use bildwerk_core::config::SessionConfig;
use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{HandleId, ImageId, ImageStatus, IngestSource};

use crate::collection::{CollectionSnapshot, ImageCollection};
use crate::ingest::{self, IngestReport, RawIngestItem};
use crate::ledger::{PreviewImage, ResourceLedger};
use crate::pipeline::EnhancementPipeline;

/// The shared mutable state: the collection and the ledger that accounts
/// for its preview handles. Guarded by one mutex so per-item transitions
/// are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct SessionState {
    pub collection: ImageCollection,
    pub ledger: ResourceLedger,
}

/// One in-memory image session, alive for the duration of a view.
pub struct Session<E: Enhancer + 'static> {
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
    pipeline: EnhancementPipeline<E>,
    assembling: Arc<AtomicBool>,
}

/// Resets the reentrancy flag when assembly finishes, on every exit path.
struct AssemblyGuard(Arc<AtomicBool>);

impl Drop for AssemblyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<E: Enhancer + 'static> Session<E> {
    pub fn new(config: SessionConfig, enhancer: E) -> Self {
        let state = Arc::new(Mutex::new(SessionState::default()));
        let pipeline =
            EnhancementPipeline::new(enhancer, Arc::clone(&state), config.preview_max_dimension);
        Self {
            config,
            state,
            pipeline,
            assembling: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -- Ingest ----------------------------------------------------------------

    /// Admit a batch from the multi-select file picker.
    pub fn ingest_files(&self, items: Vec<RawIngestItem>) -> Result<IngestReport> {
        self.ingest(IngestSource::FilePicker, items)
    }

    /// Admit a batch from the drop target.
    pub fn ingest_drop(&self, items: Vec<RawIngestItem>) -> Result<IngestReport> {
        self.ingest(IngestSource::DragDrop, items)
    }

    /// Admit a batch from a clipboard paste. Accepted items enter
    /// `Upscaling` and are submitted to the enhancement pipeline.
    pub fn ingest_clipboard(&self, items: Vec<RawIngestItem>) -> Result<IngestReport> {
        self.ingest(IngestSource::Clipboard, items)
    }

    #[instrument(skip(self, items), fields(source = ?source, count = items.len()))]
    pub fn ingest(&self, source: IngestSource, items: Vec<RawIngestItem>) -> Result<IngestReport> {
        let batch_at = chrono::Utc::now();

        let (admitted, rejected) = {
            let mut state = self.state.lock().expect("session state lock poisoned");
            let state = &mut *state;
            let (batch, rejected) =
                ingest::build_batch(source, items, &self.config, &mut state.ledger, batch_at)?;
            let ids: Vec<ImageId> = batch.iter().map(|img| img.id).collect();
            state.collection.admit(batch);
            (ids, rejected)
        };

        if source == IngestSource::Clipboard {
            for id in &admitted {
                self.pipeline.submit(*id);
            }
        }

        info!(
            admitted = admitted.len(),
            rejected = rejected.len(),
            "ingest batch processed"
        );
        let warning = ingest::aggregate_warning(&rejected);
        Ok(IngestReport {
            admitted,
            rejected,
            warning,
        })
    }

    // -- Removal ---------------------------------------------------------------

    /// Remove one item and reclaim its preview handle. Removing an item with
    /// an in-flight transform is permitted; the eventual completion is
    /// discarded by id lookup. Returns `false` for an unknown id.
    pub fn remove(&self, id: ImageId) -> bool {
        let mut state = self.state.lock().expect("session state lock poisoned");
        match state.collection.remove(id) {
            Some(img) => {
                state.ledger.reclaim(img.preview);
                true
            }
            None => false,
        }
    }

    /// Remove every item and reclaim every preview handle.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("session state lock poisoned");
        let drained = state.collection.clear();
        for img in drained {
            state.ledger.reclaim(img.preview);
        }
    }

    /// View teardown: bulk reclaim of all currently held handles. Stale
    /// enhancement completions arriving afterwards are no-ops.
    pub fn teardown(&self) {
        info!("session teardown");
        self.clear();
    }

    // -- Assembly --------------------------------------------------------------

    /// Compile the ready subset, in collection order, into one document.
    ///
    /// Rejected synchronously — before the assembly capability is contacted —
    /// when a second assembly is already in flight, when any item is still
    /// `Upscaling`, when failed items are present, or when there is nothing
    /// ready. An assembly failure propagates verbatim and leaves the
    /// collection untouched.
    #[instrument(skip(self, assembler))]
    pub async fn assemble<A: Assembler>(&self, assembler: &A) -> Result<Vec<u8>> {
        if self.assembling.swap(true, Ordering::SeqCst) {
            return Err(BildwerkError::Precondition(
                "a document is already being assembled".into(),
            ));
        }
        let _guard = AssemblyGuard(Arc::clone(&self.assembling));

        let pages = {
            let state = self.state.lock().expect("session state lock poisoned");

            let upscaling = state.collection.upscaling_count();
            if upscaling > 0 {
                return Err(BildwerkError::Precondition(format!(
                    "{upscaling} image(s) are still being enhanced"
                )));
            }

            let failed = state
                .collection
                .iter()
                .filter(|img| img.status == ImageStatus::Error)
                .count();
            if failed > 0 {
                return Err(BildwerkError::Precondition(format!(
                    "{failed} image(s) failed to enhance — remove them first"
                )));
            }

            let pages = state.collection.ready_payloads();
            if pages.is_empty() {
                return Err(BildwerkError::Precondition(
                    "no images are ready to assemble".into(),
                ));
            }
            pages
        };

        info!(pages = pages.len(), "assembling document");
        let result = assembler.assemble(pages).await;
        if let Err(ref err) = result {
            warn!(error = %err, "document assembly failed");
        }
        result
    }

    // -- Observation -----------------------------------------------------------

    /// Point-in-time view of the collection for rendering.
    pub fn snapshot(&self) -> CollectionSnapshot {
        let state = self.state.lock().expect("session state lock poisoned");
        state.collection.snapshot()
    }

    /// Monotonic change counter; observers re-render when it advances.
    pub fn generation(&self) -> u64 {
        let state = self.state.lock().expect("session state lock poisoned");
        state.collection.generation()
    }

    /// One aggregate banner over every failed item, or `None`.
    pub fn error_banner(&self) -> Option<String> {
        let state = self.state.lock().expect("session state lock poisoned");
        let failures: Vec<String> = state
            .collection
            .iter()
            .filter(|img| img.status == ImageStatus::Error)
            .map(|img| {
                let detail = img.error_detail.as_deref().unwrap_or("unknown error");
                format!("{}: {}", img.name, detail)
            })
            .collect();
        if failures.is_empty() {
            return None;
        }
        Some(format!(
            "{} image(s) failed to enhance: {}",
            failures.len(),
            failures.join("; ")
        ))
    }

    /// Render the preview behind a handle id, if it is still live.
    pub fn preview_of(&self, id: HandleId) -> Option<PreviewImage> {
        let state = self.state.lock().expect("session state lock poisoned");
        state.ledger.preview(id).cloned()
    }

    /// Number of live preview handles (equals the collection size at rest).
    pub fn live_previews(&self) -> usize {
        let state = self.state.lock().expect("session state lock poisoned");
        state.ledger.live_handles()
    }

    /// Whether any item is still in `Upscaling`.
    pub fn is_enhancing(&self) -> bool {
        let state = self.state.lock().expect("session state lock poisoned");
        state.collection.any_upscaling()
    }

    /// Whether an assembly is currently in flight (drives trigger disabling).
    pub fn is_assembling(&self) -> bool {
        self.assembling.load(Ordering::SeqCst)
    }

    /// Await every enhancement task spawned so far.
    pub async fn settle(&self) {
        self.pipeline.settle().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_tracing, png_payload};
    use bildwerk_core::capability::ImagePayload;
    use std::future::Future;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Semaphore;

    /// Test enhancer: optionally gated on a semaphore, fails for one marked
    /// input, otherwise returns a fixed valid PNG payload.
    struct StubEnhancer {
        gate: Option<Arc<Semaphore>>,
        fail_bytes: Option<Vec<u8>>,
    }

    impl StubEnhancer {
        fn instant() -> Self {
            Self {
                gate: None,
                fail_bytes: None,
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                fail_bytes: None,
            }
        }

        fn failing_on(bytes: Vec<u8>) -> Self {
            Self {
                gate: None,
                fail_bytes: Some(bytes),
            }
        }
    }

    impl Enhancer for StubEnhancer {
        fn enhance(
            &self,
            payload: ImagePayload,
        ) -> impl Future<Output = Result<ImagePayload>> + Send {
            let gate = self.gate.clone();
            let fail_bytes = self.fail_bytes.clone();
            async move {
                if let Some(gate) = gate {
                    // Each task consumes exactly one released permit.
                    gate.acquire().await.expect("gate closed").forget();
                }
                if fail_bytes.as_deref() == Some(payload.bytes.as_slice()) {
                    return Err(BildwerkError::Enhancement(
                        "synthetic transform failure".into(),
                    ));
                }
                Ok(png_payload([0xAB, 0xCD, 0xEF, 255]))
            }
        }
    }

    /// Test assembler: records the pages it was handed.
    #[derive(Default)]
    struct CapturingAssembler {
        calls: StdMutex<Vec<Vec<ImagePayload>>>,
    }

    impl Assembler for CapturingAssembler {
        fn assemble(
            &self,
            pages: Vec<ImagePayload>,
        ) -> impl Future<Output = Result<Vec<u8>>> + Send {
            self.calls.lock().expect("calls lock").push(pages);
            async move { Ok(b"%PDF-stub".to_vec()) }
        }
    }

    struct FailingAssembler;

    impl Assembler for FailingAssembler {
        fn assemble(
            &self,
            _pages: Vec<ImagePayload>,
        ) -> impl Future<Output = Result<Vec<u8>>> + Send {
            async move { Err(BildwerkError::Assembly("encoder exploded".into())) }
        }
    }

    /// Test assembler that parks until the test releases it.
    struct GatedAssembler {
        gate: Arc<Semaphore>,
    }

    impl Assembler for GatedAssembler {
        fn assemble(
            &self,
            _pages: Vec<ImagePayload>,
        ) -> impl Future<Output = Result<Vec<u8>>> + Send {
            let gate = Arc::clone(&self.gate);
            async move {
                gate.acquire().await.expect("gate closed").forget();
                Ok(b"%PDF-stub".to_vec())
            }
        }
    }

    fn raw(name: &str, color: [u8; 4]) -> RawIngestItem {
        RawIngestItem::new(
            Some(name.to_string()),
            Some("image/png".to_string()),
            png_payload(color).bytes,
        )
    }

    fn raw_paste(color: [u8; 4]) -> RawIngestItem {
        RawIngestItem::new(None, Some("image/png".to_string()), png_payload(color).bytes)
    }

    // -- Scenario A: direct path ----------------------------------------------

    #[tokio::test]
    async fn direct_files_are_ready_immediately_and_assemble_in_order() {
        init_tracing();
        let session = Session::new(SessionConfig::default(), StubEnhancer::instant());

        let inputs = [
            ("one.png", [1u8, 0, 0, 255]),
            ("two.png", [2, 0, 0, 255]),
            ("three.png", [3, 0, 0, 255]),
        ];
        let report = session
            .ingest_files(inputs.iter().map(|(n, c)| raw(n, *c)).collect())
            .expect("ingest");
        assert_eq!(report.admitted.len(), 3);
        assert!(report.warning.is_none());

        let snap = session.snapshot();
        assert!(snap.images.iter().all(|v| v.status == ImageStatus::Ready));
        assert_eq!(session.live_previews(), 3);

        let assembler = CapturingAssembler::default();
        let artifact = session.assemble(&assembler).await.expect("assemble");
        assert_eq!(artifact, b"%PDF-stub");

        let calls = assembler.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        let pages = &calls[0];
        assert_eq!(pages.len(), 3);
        for (page, (_, color)) in pages.iter().zip(inputs.iter()) {
            assert_eq!(page.bytes, png_payload(*color).bytes, "admission order kept");
        }
    }

    // -- Scenario B: mixed success and failure --------------------------------

    #[tokio::test]
    async fn paste_batch_settles_into_ready_and_error() {
        init_tracing();
        let bad = png_payload([2, 0, 0, 255]).bytes;
        let session = Session::new(SessionConfig::default(), StubEnhancer::failing_on(bad));

        let report = session
            .ingest_clipboard(vec![raw_paste([1, 0, 0, 255]), raw_paste([2, 0, 0, 255])])
            .expect("ingest");
        assert_eq!(report.admitted.len(), 2);

        session.settle().await;

        let snap = session.snapshot();
        let statuses: Vec<_> = snap.images.iter().map(|v| v.status).collect();
        assert_eq!(statuses, [ImageStatus::Ready, ImageStatus::Error]);
        assert_eq!(session.live_previews(), 2, "failed item keeps its original preview");

        let banner = session.error_banner().expect("banner present");
        assert!(banner.contains("1 image(s) failed to enhance"));
        assert!(banner.contains("synthetic transform failure"));

        // Assembly is blocked while the failed item is still present.
        let assembler = CapturingAssembler::default();
        let err = session.assemble(&assembler).await.expect_err("blocked");
        assert!(matches!(err, BildwerkError::Precondition(_)));
        assert!(assembler.calls.lock().expect("calls lock").is_empty());

        // Removing the failed item unblocks it.
        let failed_id = snap.images[1].id;
        assert!(session.remove(failed_id));
        session.assemble(&assembler).await.expect("assemble");
        assert_eq!(assembler.calls.lock().expect("calls lock").len(), 1);
    }

    // -- Scenario C: admit then remove ----------------------------------------

    #[tokio::test]
    async fn remove_returns_the_handle_count_to_zero() {
        init_tracing();
        let session = Session::new(SessionConfig::default(), StubEnhancer::instant());

        let report = session
            .ingest_files(vec![raw("only.png", [4, 4, 4, 255])])
            .expect("ingest");
        assert_eq!(session.live_previews(), 1);

        assert!(session.remove(report.admitted[0]));
        assert_eq!(session.live_previews(), 0);
        assert!(session.snapshot().images.is_empty());

        // Removing again is a no-op.
        assert!(!session.remove(report.admitted[0]));
    }

    // -- Scenario D: removal during flight ------------------------------------

    #[tokio::test]
    async fn stale_completion_after_removal_is_discarded() {
        init_tracing();
        let gate = Arc::new(Semaphore::new(0));
        let session = Session::new(
            SessionConfig::default(),
            StubEnhancer::gated(Arc::clone(&gate)),
        );

        let report = session
            .ingest_clipboard(vec![raw_paste([6, 6, 6, 255])])
            .expect("ingest");
        let id = report.admitted[0];
        assert!(session.is_enhancing());

        // Remove while the transform is parked on the gate.
        assert!(session.remove(id));
        assert_eq!(session.live_previews(), 0);

        // Let the transform settle; the completion must be a silent no-op.
        gate.add_permits(1);
        session.settle().await;

        assert!(session.snapshot().images.is_empty());
        assert_eq!(session.live_previews(), 0);
        assert!(session.error_banner().is_none());
    }

    #[tokio::test]
    async fn clear_during_flight_is_absorbed_the_same_way() {
        init_tracing();
        let gate = Arc::new(Semaphore::new(0));
        let session = Session::new(
            SessionConfig::default(),
            StubEnhancer::gated(Arc::clone(&gate)),
        );

        session
            .ingest_clipboard(vec![raw_paste([1, 1, 1, 255]), raw_paste([2, 2, 2, 255])])
            .expect("ingest");
        session
            .ingest_files(vec![raw("kept-elsewhere.png", [3, 3, 3, 255])])
            .expect("ingest");
        assert_eq!(session.live_previews(), 3);

        session.clear();
        assert_eq!(session.live_previews(), 0);

        gate.add_permits(2);
        session.settle().await;

        assert!(session.snapshot().images.is_empty());
        assert_eq!(session.live_previews(), 0);
    }

    // -- Completion order independence ----------------------------------------

    #[tokio::test]
    async fn completions_may_settle_out_of_submission_order() {
        init_tracing();
        let gate = Arc::new(Semaphore::new(0));
        let session = Session::new(
            SessionConfig::default(),
            StubEnhancer::gated(Arc::clone(&gate)),
        );

        session
            .ingest_clipboard(vec![raw_paste([1, 0, 0, 255]), raw_paste([2, 0, 0, 255])])
            .expect("ingest");

        // Release both; the scheduler decides the completion order.
        gate.add_permits(2);
        session.settle().await;

        let snap = session.snapshot();
        assert!(snap.images.iter().all(|v| v.status == ImageStatus::Ready));
        // Collection order is still submission order regardless of which
        // transform finished first.
        assert_eq!(snap.images.len(), 2);
        assert_eq!(session.live_previews(), 2);
    }

    // -- Assembly preconditions ------------------------------------------------

    #[tokio::test]
    async fn assembly_with_nothing_ready_is_rejected_before_invocation() {
        init_tracing();
        let session = Session::new(SessionConfig::default(), StubEnhancer::instant());

        let assembler = CapturingAssembler::default();
        let err = session.assemble(&assembler).await.expect_err("rejected");
        assert!(matches!(err, BildwerkError::Precondition(_)));
        assert!(assembler.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn assembly_while_upscaling_is_rejected_before_invocation() {
        init_tracing();
        let gate = Arc::new(Semaphore::new(0));
        let session = Session::new(
            SessionConfig::default(),
            StubEnhancer::gated(Arc::clone(&gate)),
        );

        session
            .ingest_files(vec![raw("ready.png", [1, 1, 1, 255])])
            .expect("ingest");
        session
            .ingest_clipboard(vec![raw_paste([2, 2, 2, 255])])
            .expect("ingest");

        let assembler = CapturingAssembler::default();
        let err = session.assemble(&assembler).await.expect_err("rejected");
        match err {
            BildwerkError::Precondition(detail) => {
                assert!(detail.contains("still being enhanced"), "{detail}");
            }
            other => panic!("expected precondition, got {other:?}"),
        }
        assert!(assembler.calls.lock().expect("calls lock").is_empty());

        gate.add_permits(1);
        session.settle().await;
        session.assemble(&assembler).await.expect("now assembles");
    }

    #[tokio::test]
    async fn a_second_assembly_trigger_is_rejected_while_one_is_in_flight() {
        init_tracing();
        let session = Arc::new(Session::new(SessionConfig::default(), StubEnhancer::instant()));
        session
            .ingest_files(vec![raw("page.png", [1, 1, 1, 255])])
            .expect("ingest");

        let gate = Arc::new(Semaphore::new(0));
        let assembler = Arc::new(GatedAssembler {
            gate: Arc::clone(&gate),
        });

        let first = {
            let session = Arc::clone(&session);
            let assembler = Arc::clone(&assembler);
            tokio::spawn(async move { session.assemble(&*assembler).await })
        };

        // Wait for the first trigger to take the flag.
        while !session.is_assembling() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let err = session
            .assemble(&*assembler)
            .await
            .expect_err("reentrant trigger rejected");
        assert!(matches!(err, BildwerkError::Precondition(_)));

        gate.add_permits(1);
        let artifact = first.await.expect("join").expect("first assembly");
        assert_eq!(artifact, b"%PDF-stub");
        assert!(!session.is_assembling());
    }

    #[tokio::test]
    async fn assembly_failure_propagates_and_leaves_the_collection_unchanged() {
        init_tracing();
        let session = Session::new(SessionConfig::default(), StubEnhancer::instant());
        session
            .ingest_files(vec![raw("a.png", [1, 1, 1, 255]), raw("b.png", [2, 2, 2, 255])])
            .expect("ingest");

        let generation = session.generation();
        let err = session
            .assemble(&FailingAssembler)
            .await
            .expect_err("fails");
        assert!(matches!(err, BildwerkError::Assembly(_)));

        assert_eq!(session.generation(), generation, "collection untouched");
        assert_eq!(session.live_previews(), 2);
        assert!(!session.is_assembling(), "flag reset for retry");

        // The user may retry.
        let assembler = CapturingAssembler::default();
        session.assemble(&assembler).await.expect("retry succeeds");
    }

    // -- Teardown ---------------------------------------------------------------

    #[tokio::test]
    async fn teardown_reclaims_every_live_handle() {
        init_tracing();
        let gate = Arc::new(Semaphore::new(0));
        let session = Session::new(
            SessionConfig::default(),
            StubEnhancer::gated(Arc::clone(&gate)),
        );

        session
            .ingest_files(vec![raw("a.png", [1, 1, 1, 255])])
            .expect("ingest");
        session
            .ingest_clipboard(vec![raw_paste([2, 2, 2, 255])])
            .expect("ingest");
        assert_eq!(session.live_previews(), 2);

        session.teardown();
        assert_eq!(session.live_previews(), 0);

        // An in-flight transform settling after teardown changes nothing.
        gate.add_permits(1);
        session.settle().await;
        assert_eq!(session.live_previews(), 0);
        assert!(session.snapshot().images.is_empty());
    }

    // -- Strict ingest ----------------------------------------------------------

    #[tokio::test]
    async fn strict_ingest_admits_nothing_on_a_mixed_batch() {
        init_tracing();
        let config = SessionConfig {
            strict_ingest: true,
            ..SessionConfig::default()
        };
        let session = Session::new(config, StubEnhancer::instant());

        let err = session
            .ingest_files(vec![
                raw("good.png", [1, 1, 1, 255]),
                RawIngestItem::new(
                    Some("deck.pptx".to_string()),
                    Some("application/vnd.ms-powerpoint".to_string()),
                    vec![0; 4],
                ),
            ])
            .expect_err("strict batch rejected");

        assert!(matches!(err, BildwerkError::IngestRejected(_)));
        assert!(session.snapshot().images.is_empty());
        assert_eq!(session.live_previews(), 0);
    }
}
