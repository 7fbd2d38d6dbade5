//! The add-roots coordinator: one worker per dataset, batching
//! concurrent `AddRoots` requests so the `firstAdded` piece-index the
//! on-chain signature binds to never collides between two concurrent
//! submissions.

use crate::error::ChainError;
use crate::traits::Verifier;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

const MAX_QUEUE: usize = 1000;
const MIN_BATCH: usize = 1;
const MAX_BATCH: usize = 20;
const INITIAL_BATCH: usize = 5;
const BATCH_WINDOW: Duration = Duration::from_millis(100);
const RESYNC_INTERVAL: Duration = Duration::from_secs(60);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const SUCCESS_WINDOW: usize = 20;

/// One pending root-add, opaque to the coordinator beyond how many piece
/// IDs it will consume (`piece_count`, normally 1 per root).
#[derive(Debug, Clone)]
pub struct PendingRootAdd {
    pub root_cid: String,
    pub piece_count: u64,
}

#[async_trait::async_trait]
pub trait AddRootsSubmitter: Send + Sync {
    async fn submit_batch(
        &self,
        set_id: i64,
        first_added: u64,
        batch: &[PendingRootAdd],
    ) -> Result<String, ChainError>;
}

struct SuccessTracker {
    outcomes: VecDeque<bool>,
}

impl SuccessTracker {
    fn new() -> Self {
        Self { outcomes: VecDeque::with_capacity(SUCCESS_WINDOW) }
    }

    fn record(&mut self, ok: bool) {
        if self.outcomes.len() == SUCCESS_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(ok);
    }

    fn rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 1.0;
        }
        self.outcomes.iter().filter(|v| **v).count() as f64 / self.outcomes.len() as f64
    }
}

struct QueuedRequest {
    item: PendingRootAdd,
    respond_to: oneshot::Sender<Result<String, ChainError>>,
}

/// Handle to one dataset's background worker. Dropping the last clone of
/// the handle's `tx` closes the channel, which drains the worker loop.
pub struct DatasetCoordinator {
    tx: mpsc::Sender<QueuedRequest>,
    shutdown: CancellationToken,
}

impl DatasetCoordinator {
    pub fn spawn(
        set_id: i64,
        verifier: Arc<dyn Verifier>,
        submitter: Arc<dyn AddRootsSubmitter>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(MAX_QUEUE);
        let shutdown = CancellationToken::new();
        let worker_shutdown = shutdown.clone();
        tokio::spawn(async move {
            run_worker(set_id, verifier, submitter, rx, worker_shutdown).await;
        });
        Self { tx, shutdown }
    }

    pub async fn enqueue(&self, item: PendingRootAdd) -> Result<String, ChainError> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(QueuedRequest { item, respond_to })
            .await
            .map_err(|_| ChainError::Other(anyhow::anyhow!("coordinator worker has stopped")))?;
        response
            .await
            .map_err(|_| ChainError::Other(anyhow::anyhow!("coordinator dropped the request")))?
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn run_worker(
    set_id: i64,
    verifier: Arc<dyn Verifier>,
    submitter: Arc<dyn AddRootsSubmitter>,
    mut rx: mpsc::Receiver<QueuedRequest>,
    shutdown: CancellationToken,
) {
    let mut local_next_piece_id = verifier.next_piece_id(set_id as u64).await.unwrap_or(0);
    let mut batch_size = INITIAL_BATCH;
    let mut tracker = SuccessTracker::new();
    let mut last_resync = tokio::time::Instant::now();

    loop {
        let mut batch: Vec<QueuedRequest> = Vec::new();
        let window_deadline = tokio::time::Instant::now() + BATCH_WINDOW;
        let mut shutting_down = false;

        while batch.len() < batch_size {
            tokio::select! {
                _ = shutdown.cancelled() => { shutting_down = true; break; },
                maybe = rx.recv() => match maybe {
                    Some(req) => batch.push(req),
                    None => break,
                },
                _ = tokio::time::sleep_until(window_deadline) => break,
            }
        }

        if batch.is_empty() {
            if shutting_down || rx.is_closed() {
                break;
            }
            if last_resync.elapsed() > RESYNC_INTERVAL {
                resync(&verifier, set_id, &mut local_next_piece_id).await;
                last_resync = tokio::time::Instant::now();
            }
            continue;
        }

        let items: Vec<PendingRootAdd> = batch.iter().map(|r| r.item.clone()).collect();
        let total_pieces: u64 = items.iter().map(|i| i.piece_count).sum();
        let first_added = local_next_piece_id;

        let outcome = tokio::time::timeout(SUBMIT_TIMEOUT, submitter.submit_batch(set_id, first_added, &items))
            .await
            .unwrap_or_else(|_| Err(ChainError::Other(anyhow::anyhow!("add-roots submit timed out"))));

        match outcome {
            Ok(tx_hash) => {
                local_next_piece_id += total_pieces;
                tracker.record(true);
                adapt_batch_size(&mut batch_size, &tracker);
                for req in batch {
                    let _ = req.respond_to.send(Ok(tx_hash.clone()));
                }
            }
            Err(ChainError::SignatureMismatch(reason)) => {
                tracing::warn!(set_id, %reason, "add-roots signature mismatch, resyncing and retrying once");
                resync(&verifier, set_id, &mut local_next_piece_id).await;
                last_resync = tokio::time::Instant::now();
                tracker.record(false);
                adapt_batch_size(&mut batch_size, &tracker);

                let retry_first_added = local_next_piece_id;
                match submitter.submit_batch(set_id, retry_first_added, &items).await {
                    Ok(tx_hash) => {
                        local_next_piece_id += total_pieces;
                        for req in batch {
                            let _ = req.respond_to.send(Ok(tx_hash.clone()));
                        }
                    }
                    Err(err) => {
                        let message = err.to_string();
                        for req in batch {
                            let _ = req.respond_to.send(Err(ChainError::Other(anyhow::anyhow!(message.clone()))));
                        }
                    }
                }
            }
            Err(err) => {
                tracker.record(false);
                adapt_batch_size(&mut batch_size, &tracker);
                let message = err.to_string();
                for req in batch {
                    let _ = req.respond_to.send(Err(ChainError::Other(anyhow::anyhow!(message.clone()))));
                }
            }
        }

        if shutting_down {
            break;
        }

        if last_resync.elapsed() > RESYNC_INTERVAL {
            resync(&verifier, set_id, &mut local_next_piece_id).await;
            last_resync = tokio::time::Instant::now();
        }
    }

    tracing::info!(set_id, "add-roots coordinator worker exiting");
}

async fn resync(verifier: &Arc<dyn Verifier>, set_id: i64, local_next_piece_id: &mut u64) {
    match verifier.next_piece_id(set_id as u64).await {
        Ok(chain_value) => *local_next_piece_id = chain_value,
        Err(err) => tracing::warn!(set_id, %err, "resync of nextPieceId failed, keeping local counter"),
    }
}

fn adapt_batch_size(batch_size: &mut usize, tracker: &SuccessTracker) {
    let rate = tracker.rate();
    if rate > 0.95 {
        *batch_size = (*batch_size + 2).min(MAX_BATCH);
    } else if rate < 0.80 {
        *batch_size = (*batch_size / 2).max(MIN_BATCH);
    }
}

/// Owns one [`DatasetCoordinator`] per dataset, creating it lazily on
/// first use.
pub struct AddRootsCoordinators {
    verifier: Arc<dyn Verifier>,
    submitter: Arc<dyn AddRootsSubmitter>,
    live: DashMap<i64, Arc<DatasetCoordinator>>,
    stopped: AtomicBool,
}

impl AddRootsCoordinators {
    pub fn new(verifier: Arc<dyn Verifier>, submitter: Arc<dyn AddRootsSubmitter>) -> Self {
        Self { verifier, submitter, live: DashMap::new(), stopped: AtomicBool::new(false) }
    }

    pub async fn enqueue(&self, set_id: i64, item: PendingRootAdd) -> Result<String, ChainError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ChainError::Other(anyhow::anyhow!("add-roots coordinators are shutting down")));
        }
        let coordinator = self
            .live
            .entry(set_id)
            .or_insert_with(|| Arc::new(DatasetCoordinator::spawn(set_id, self.verifier.clone(), self.submitter.clone())))
            .clone();
        coordinator.enqueue(item).await
    }

    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        for entry in self.live.iter() {
            entry.value().shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_tracker_grows_and_shrinks_batch_size() {
        let mut tracker = SuccessTracker::new();
        for _ in 0..20 {
            tracker.record(true);
        }
        let mut batch_size = INITIAL_BATCH;
        adapt_batch_size(&mut batch_size, &tracker);
        assert_eq!(batch_size, INITIAL_BATCH + 2);

        for _ in 0..20 {
            tracker.record(false);
        }
        adapt_batch_size(&mut batch_size, &tracker);
        assert_eq!(batch_size, (INITIAL_BATCH + 2) / 2);
    }

    #[test]
    fn batch_size_never_exceeds_cap_or_drops_to_zero() {
        let mut batch_size = MAX_BATCH;
        let mut tracker = SuccessTracker::new();
        for _ in 0..20 {
            tracker.record(true);
        }
        adapt_batch_size(&mut batch_size, &tracker);
        assert_eq!(batch_size, MAX_BATCH);

        let mut batch_size = MIN_BATCH;
        let mut tracker = SuccessTracker::new();
        for _ in 0..20 {
            tracker.record(false);
        }
        adapt_batch_size(&mut batch_size, &tracker);
        assert_eq!(batch_size, MIN_BATCH);
    }
}
