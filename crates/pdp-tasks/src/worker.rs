use crate::handler::{Outcome, QueueOptions, TaskHandler};
use chrono::Utc;
use pdp_db::{models::NewTaskHistory, PdpDb};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One worker loop for one queue: lease, heartbeat while running, then
/// complete/retry/dead-letter. `inflight` is incremented for the duration
/// of an active lease so [`crate::engine::TaskEngine::stop`] can wait for
/// in-flight handlers to drain.
pub async fn run_worker(
    db: PdpDb,
    queue_name: String,
    session_id: String,
    handler: Arc<dyn TaskHandler>,
    options: QueueOptions,
    shutdown: CancellationToken,
    inflight: Arc<AtomicUsize>,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let leased = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = db.lease_next_task(queue_name.clone(), session_id.clone(), options.lease_duration) => result,
        };

        let task = match leased {
            Ok(Some(task)) => task,
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(options.poll_interval) => continue,
                }
            }
            Err(err) => {
                tracing::error!(queue = %queue_name, error = %err, "failed to lease task");
                tokio::time::sleep(options.poll_interval).await;
                continue;
            }
        };

        inflight.fetch_add(1, Ordering::SeqCst);
        let work_start = Utc::now();

        let outcome = {
            let heartbeat_db = db.clone();
            let heartbeat_task_id = task.id;
            let heartbeat_session = session_id.clone();
            let heartbeat_interval = options.heartbeat_interval;
            let heartbeat_lease = options.lease_duration;

            let heartbeat = async move {
                loop {
                    tokio::time::sleep(heartbeat_interval).await;
                    if let Err(err) = heartbeat_db
                        .heartbeat_task(heartbeat_task_id, heartbeat_session.clone(), heartbeat_lease)
                        .await
                    {
                        tracing::warn!(task_id = heartbeat_task_id, error = %err, "heartbeat failed");
                    }
                }
            };

            tokio::select! {
                outcome = handler.handle(&task.payload) => outcome,
                _ = heartbeat => unreachable!("heartbeat loop never returns"),
            }
        };

        let work_end = Utc::now();
        let (result, err) = match &outcome {
            Outcome::Done => (true, None),
            Outcome::Retry(err) => (false, Some(err.clone())),
            Outcome::Permanent(err) => (false, Some(err.clone())),
        };

        match outcome {
            Outcome::Done => {
                if let Err(e) = db.complete_task(task.id).await {
                    tracing::error!(task_id = task.id, error = %e, "failed to complete task");
                }
            }
            Outcome::Permanent(_) => {
                if let Err(e) = db
                    .fail_or_deadletter(task.id, 0, err.as_deref().unwrap_or("permanent failure"))
                    .await
                {
                    tracing::error!(task_id = task.id, error = %e, "failed to dead-letter task");
                }
            }
            Outcome::Retry(_) => {
                if let Err(e) = db
                    .fail_or_deadletter(task.id, options.max_retries, err.as_deref().unwrap_or("retry"))
                    .await
                {
                    tracing::error!(task_id = task.id, error = %e, "failed to record retry");
                }
            }
        }

        if let Err(e) = db
            .insert_task_history(NewTaskHistory {
                task_id: task.id,
                name: task.name.clone(),
                posted: task.posted_at,
                work_start: Some(work_start),
                work_end: Some(work_end),
                result: Some(result),
                err,
                completed_by_session_id: Some(session_id.clone()),
            })
            .await
        {
            tracing::error!(task_id = task.id, error = %e, "failed to record task history");
        }

        inflight.fetch_sub(1, Ordering::SeqCst);
    }
}
