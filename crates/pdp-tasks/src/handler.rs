use async_trait::async_trait;

/// What a queue's handler returns: success, a retryable failure, or a
/// permanent failure that should skip straight to dead-letter regardless
/// of remaining retry budget (e.g. a non-retryable `txSuccess=false` seen
/// during the transaction sender's confirmation wait).
pub enum Outcome {
    Done,
    Retry(String),
    Permanent(String),
}

/// A queue's work function. Implementors deserialize `payload` themselves;
/// the engine treats it as an opaque byte blob.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, payload: &[u8]) -> Outcome;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Outcome> + Send,
{
    async fn handle(&self, payload: &[u8]) -> Outcome {
        (self)(payload.to_vec()).await
    }
}

/// Per-queue options: name, handler, max retries, max workers, lease
/// duration, and heartbeat interval.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub max_retries: i32,
    pub max_workers: usize,
    pub lease_duration: chrono::Duration,
    pub heartbeat_interval: std::time::Duration,
    pub poll_interval: std::time::Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_workers: 4,
            lease_duration: chrono::Duration::seconds(30),
            heartbeat_interval: std::time::Duration::from_secs(10),
            poll_interval: std::time::Duration::from_millis(500),
        }
    }
}
