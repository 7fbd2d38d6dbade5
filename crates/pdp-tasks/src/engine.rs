//! The task engine: a registry of named queues, each with its own handler,
//! options, and worker pool, all leasing rows out of the same `pdp-db`
//! `tasks` table.

use crate::handler::{QueueOptions, TaskHandler};
use crate::worker::run_worker;
use pdp_db::{models::NewTask, PdpDb};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningQueue {
    workers: Vec<JoinHandle<()>>,
    inflight: Arc<AtomicUsize>,
}

pub struct TaskEngine {
    db: PdpDb,
    session_id: String,
    shutdown: CancellationToken,
    queues: std::sync::Mutex<HashMap<String, RunningQueue>>,
}

impl TaskEngine {
    pub fn new(db: PdpDb) -> Arc<Self> {
        Arc::new(Self {
            db,
            session_id: uuid::Uuid::new_v4().to_string(),
            shutdown: CancellationToken::new(),
            queues: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Registers a queue and starts its worker pool. Registering the same
    /// name twice replaces the running workers for that name.
    pub fn register_queue(
        self: &Arc<Self>,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        options: QueueOptions,
    ) {
        let name = name.into();
        let inflight = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(options.max_workers);
        for _ in 0..options.max_workers {
            let db = self.db.clone();
            let queue_name = name.clone();
            let session_id = self.session_id.clone();
            let handler = handler.clone();
            let options = options.clone();
            let shutdown = self.shutdown.clone();
            let inflight = inflight.clone();
            workers.push(tokio::spawn(async move {
                run_worker(db, queue_name, session_id, handler, options, shutdown, inflight).await;
            }));
        }
        self.queues.lock().unwrap().insert(name, RunningQueue { workers, inflight });
    }

    pub async fn enqueue(&self, queue_name: impl Into<String>, payload: Vec<u8>) -> Result<i64, pdp_db::DbError> {
        let task = self
            .db
            .enqueue_task(NewTask { name: queue_name.into(), payload })
            .await?;
        Ok(task.id)
    }

    /// Refuses new leases (workers stop claiming new rows on their next
    /// poll), then waits for in-flight handlers to finish, up to `timeout`.
    pub async fn stop(&self, timeout: Duration) {
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let still_running = {
                let queues = self.queues.lock().unwrap();
                queues.values().any(|q| q.inflight.load(Ordering::SeqCst) > 0)
            };
            if !still_running || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut queues = self.queues.lock().unwrap();
            queues.values_mut().flat_map(|q| q.workers.drain(..)).collect()
        };
        for handle in handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Outcome;
    use pdp_db::{establish_pool, run_migrations};
    use std::sync::atomic::AtomicBool;

    fn test_db() -> PdpDb {
        let url = std::env::var("PDP_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/pdp_test".to_string());
        let pool = establish_pool(&url, 4).unwrap();
        run_migrations(&pool).unwrap();
        PdpDb::new(pool)
    }

    #[ignore = "requires a running postgres instance"]
    #[tokio::test]
    async fn enqueued_task_is_processed_exactly_once() {
        let engine = TaskEngine::new(test_db());
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        engine.register_queue(
            "noop",
            Arc::new(move |_payload: Vec<u8>| {
                let ran = ran_clone.clone();
                async move {
                    ran.store(true, Ordering::SeqCst);
                    Outcome::Done
                }
            }),
            QueueOptions { max_workers: 1, poll_interval: Duration::from_millis(20), ..Default::default() },
        );

        engine.enqueue("noop", b"{}".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(ran.load(Ordering::SeqCst));

        engine.stop(Duration::from_secs(1)).await;
    }
}
