//! The chain scheduler: polls for tip-set advances and fires
//! registered listeners serially. A slow listener is intentional
//! back-pressure, not a bug — listeners that need concurrency dispatch
//! internally instead of returning early.

use crate::provider::RpcChainProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ChainListener: Send + Sync {
    async fn on_tip(&self, tip: u64);
}

pub struct ChainScheduler {
    provider: Arc<RpcChainProvider>,
    listeners: Vec<Arc<dyn ChainListener>>,
    poll_interval: Duration,
}

impl ChainScheduler {
    pub fn new(provider: Arc<RpcChainProvider>, poll_interval: Duration) -> Self {
        Self { provider, listeners: Vec::new(), poll_interval }
    }

    pub fn register(&mut self, listener: Arc<dyn ChainListener>) {
        self.listeners.push(listener);
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut last_seen: Option<u64> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("chain scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let tip = match self.provider.block_number().await {
                Ok(tip) => tip,
                Err(err) => {
                    tracing::warn!(%err, "chain scheduler failed to poll tip, retrying next interval");
                    continue;
                }
            };

            if last_seen == Some(tip) {
                continue;
            }
            last_seen = Some(tip);

            for listener in &self.listeners {
                listener.on_tip(tip).await;
            }
        }
    }
}
