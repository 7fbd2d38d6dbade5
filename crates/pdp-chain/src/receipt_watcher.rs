//! The receipt watcher: a chain-scheduler listener that polls
//! pending `MessageWaitsEth` rows, matches receipts, and records the
//! outcome. Event-specific ID extraction happens lazily, against the
//! stored receipt JSON, by whoever is asking (`pdp-core`'s status reads) —
//! see [`crate::events`] — rather than here, so this listener stays a
//! single generic loop over every pending row regardless of which table
//! referencing it cares about the result.

use crate::provider::RpcChainProvider;
use crate::scheduler::ChainListener;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pdp_db::PdpDb;
use std::sync::Arc;

/// How many `eth_getTransactionReceipt` lookups this listener keeps in
/// flight at once.
const POLL_CONCURRENCY: usize = 8;

pub struct ReceiptWatcher {
    db: PdpDb,
    provider: Arc<RpcChainProvider>,
}

impl ReceiptWatcher {
    pub fn new(db: PdpDb, provider: Arc<RpcChainProvider>) -> Self {
        Self { db, provider }
    }

    async fn poll_once(&self) {
        let pending = match self.db.list_pending_message_waits().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%err, "failed to list pending message waits");
                return;
            }
        };

        stream::iter(pending)
            .map(|row| self.confirm_one(row))
            .buffer_unordered(POLL_CONCURRENCY)
            .collect::<Vec<()>>()
            .await;
    }

    async fn confirm_one(&self, row: pdp_db::models::MessageWaitEth) {
        let receipt = match self.provider.get_transaction_receipt(&row.signed_tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(tx_hash = %row.signed_tx_hash, %err, "eth_getTransactionReceipt failed");
                return;
            }
        };

        let success = receipt
            .get("status")
            .and_then(|v| v.as_str())
            .map(|s| s == "0x1")
            .unwrap_or(false);
        let block_number = receipt
            .get("blockNumber")
            .and_then(|v| v.as_str())
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0) as i64;

        if let Err(err) = self
            .db
            .confirm_message(row.signed_tx_hash.clone(), success, receipt, block_number)
            .await
        {
            tracing::warn!(tx_hash = %row.signed_tx_hash, %err, "failed to record confirmation");
        }
    }
}

#[async_trait]
impl ChainListener for ReceiptWatcher {
    async fn on_tip(&self, _tip: u64) {
        self.poll_once().await;
    }
}
