//! The `PdpService` facade: the single handle `pdp-host` wires
//! up once at startup and threads through every HTTP handler as `axum`'s
//! shared `State` extractor value.

use crate::add_roots::{AddRootsService, AddRootsValidator, CoreAddRootsSubmitter, RootAddRequest};
use crate::pieces::PieceService;
use crate::proofsets::ProofSetService;
use crate::registration::RegistrationService;
use pdp_chain::AddRootsCoordinators;
use pdp_resolver::{CommpPipeline, PieceResolver};
use pdp_store::{BlobObject, Blobstore, Stash};
use pdp_tasks::TaskEngine;
use pdp_types::ServiceConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Decrements its counter on drop, so an early return or panic mid-handler
/// never leaves the counter stuck above zero.
pub struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct PdpService {
    pub config: ServiceConfig,
    pub store: Arc<Blobstore>,
    pub stash: Stash,
    pub resolver: Arc<PieceResolver>,
    pub commp_pipeline: Arc<CommpPipeline>,
    pub tasks: Arc<TaskEngine>,
    pub pieces: PieceService,
    pub proof_sets: ProofSetService,
    pub add_roots: AddRootsService,
    pub registration: Arc<RegistrationService>,
    add_roots_validator: AddRootsValidator,
    add_roots_submitter: Arc<CoreAddRootsSubmitter>,
    add_roots_coordinators: Arc<AddRootsCoordinators>,
    active_uploads: Arc<AtomicUsize>,
    active_downloads: Arc<AtomicUsize>,
}

impl PdpService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ServiceConfig,
        store: Arc<Blobstore>,
        stash: Stash,
        resolver: Arc<PieceResolver>,
        commp_pipeline: Arc<CommpPipeline>,
        tasks: Arc<TaskEngine>,
        pieces: PieceService,
        proof_sets: ProofSetService,
        add_roots: AddRootsService,
        registration: Arc<RegistrationService>,
        add_roots_validator: AddRootsValidator,
        add_roots_submitter: Arc<CoreAddRootsSubmitter>,
        add_roots_coordinators: Arc<AddRootsCoordinators>,
    ) -> Self {
        Self {
            config,
            store,
            stash,
            resolver,
            commp_pipeline,
            tasks,
            pieces,
            proof_sets,
            add_roots,
            registration,
            add_roots_validator,
            add_roots_submitter,
            add_roots_coordinators,
            active_uploads: Arc::new(AtomicUsize::new(0)),
            active_downloads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn node_type(&self) -> &str {
        &self.config.node_type
    }

    /// Admits one more in-flight upload, or `None` if `max_concurrent_uploads`
    /// is already reached - the handler should reject with a 503/429 rather
    /// than block.
    pub fn begin_upload(&self) -> Option<InFlightGuard> {
        admit(&self.active_uploads, self.config.max_concurrent_uploads)
    }

    pub fn begin_download(&self) -> Option<InFlightGuard> {
        admit(&self.active_downloads, self.config.max_concurrent_downloads)
    }

    pub fn active_uploads(&self) -> usize {
        self.active_uploads.load(Ordering::SeqCst)
    }

    pub fn active_downloads(&self) -> usize {
        self.active_downloads.load(Ordering::SeqCst)
    }

    /// `Stop(ctx)`: polls `activeUploads + activeDownloads` at 100ms until
    /// both reach zero or `timeout` expires, then stops the task engine.
    /// Drains in-flight HTTP work before the task queues so a commP job
    /// enqueued by a upload that's still finishing isn't lost mid-shutdown.
    pub async fn stop(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let in_flight = self.active_uploads() + self.active_downloads();
            if in_flight == 0 || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        self.tasks.stop(remaining).await;
    }

    /// `AddRoots` entry point for HTTP: validates then hands the
    /// computed roots to the per-dataset [`AddRootsCoordinators`] worker so
    /// concurrent callers targeting the same proof set never race on
    /// `firstAdded`. [`crate::AddRootsService::add_roots`] remains available
    /// as the direct, non-coordinated path for single-caller use.
    pub async fn add_roots_coordinated(&self, service: &str, set_id: i64, requested: Vec<RootAddRequest>) -> crate::error::CoreResult<String> {
        self.add_roots_submitter
            .enqueue(&self.add_roots_coordinators, &self.add_roots_validator, &self.registration, service, set_id, requested)
            .await
    }

    /// `GET /piece/:cid` support: opens the blob a piece CID resolves to,
    /// optionally ranged, counted against the download in-flight budget.
    pub async fn open_piece(&self, piece_cid: &str, range: Option<(u64, u64)>) -> crate::error::CoreResult<(BlobObject, Option<InFlightGuard>)> {
        let guard = self.begin_download();
        let (blob_mhash, _size) = self
            .resolver
            .resolve_to_blob(piece_cid)
            .await?
            .ok_or_else(|| crate::error::CoreError::NotFound(format!("no blob for piece {piece_cid}")))?;
        let object = self.pieces.open_blob(&blob_mhash, range).await?;
        Ok((object, guard))
    }
}

fn admit(counter: &Arc<AtomicUsize>, max: usize) -> Option<InFlightGuard> {
    loop {
        let current = counter.load(Ordering::SeqCst);
        if current >= max {
            return None;
        }
        if counter.compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            return Some(InFlightGuard(counter.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admit_refuses_past_the_limit_and_releases_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = admit(&counter, 1);
        assert!(a.is_some());
        assert!(admit(&counter, 1).is_none());
        drop(a);
        assert!(admit(&counter, 1).is_some());
    }
}
