//! The transaction sender: nonce reservation, gas filling,
//! signing, submission. Never retries on submit failure — that decision
//! is left to callers.

use crate::error::ChainError;
use crate::provider::RpcChainProvider;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use dashmap::DashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// A transaction the sender submits on the caller's behalf; everything
/// except `to`/`data`/`value` is filled in by [`TransactionSender::send`]
/// when left unset.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
}

pub struct TransactionSender {
    provider: Arc<RpcChainProvider>,
    signer: PrivateKeySigner,
    chain_id: u64,
    // Per-address mutex serialising reserve-nonce -> submit, so two
    // concurrent sends from the same address never race on the same nonce.
    // Scoped to this process: nonce state is read fresh from the chain on
    // every reservation rather than persisted, since the schema carries no
    // durable nonce table.
    nonce_locks: DashMap<Address, Arc<AsyncMutex<()>>>,
}

impl TransactionSender {
    pub fn new(provider: Arc<RpcChainProvider>, signer_private_key_hex: &str, chain_id: u64) -> Result<Self, ChainError> {
        let signer = PrivateKeySigner::from_str(signer_private_key_hex)
            .map_err(|e| ChainError::Other(anyhow::anyhow!("invalid signing key: {e}")))?;
        Ok(Self { provider, signer, chain_id, nonce_locks: DashMap::new() })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn lock_for(&self, address: Address) -> Arc<AsyncMutex<()>> {
        self.nonce_locks.entry(address).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `Send(ctx, from, tx, reason) -> txHash`: reserves a nonce, fills gas,
    /// signs and submits. The `MessageWaitsEth` insert is the caller's job,
    /// done in the same DB transaction as whatever business row it's writing.
    pub async fn send(&self, tx: TxRequest, reason: &str) -> Result<String, ChainError> {
        let from = self.signer.address();
        let lock = self.lock_for(from);
        let _guard = lock.lock().await;

        tracing::debug!(%from, reason, "reserving nonce for submission");
        let nonce = self.provider.transaction_count(from).await?;

        let gas_price = self.provider.gas_price().await?;
        let priority_fee = self.provider.max_priority_fee_per_gas().await?;
        let max_fee_per_gas = gas_price.saturating_mul(2).max(priority_fee);

        let unsigned = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit: tx.gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_fee,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.data,
            access_list: Default::default(),
        };

        let signature_hash = unsigned.signature_hash();
        let signature = self
            .signer
            .sign_hash(&signature_hash)
            .await
            .map_err(|e| ChainError::Other(anyhow::anyhow!("signing failed: {e}")))?;

        let signed = unsigned.into_signed(signature);
        let envelope = TxEnvelope::Eip1559(signed);
        let raw = envelope.encoded_2718();

        tracing::info!(%from, nonce, reason, "submitting transaction");
        self.provider.send_raw_transaction(raw.into()).await.map_err(classify_signature_mismatch)
    }
}

/// `eth_sendRawTransaction` surfaces a stale `firstAdded`/off-chain
/// signature as a plain RPC revert, not a distinct JSON-RPC error code.
/// Recognize the node's revert text so the add-roots coordinator can tell
/// "resync and retry" apart from every other submit failure.
fn classify_signature_mismatch(err: ChainError) -> ChainError {
    if let ChainError::Rpc { message, .. } = &err {
        let lower = message.to_lowercase();
        if lower.contains("signature") || lower.contains("firstadded") || lower.contains("invalidsignature") {
            return ChainError::SignatureMismatch(message.clone());
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_signature_revert_text() {
        let err = ChainError::Rpc { method: "eth_sendRawTransaction", message: "execution reverted: InvalidSignature()".to_string() };
        assert!(matches!(classify_signature_mismatch(err), ChainError::SignatureMismatch(_)));
    }

    #[test]
    fn recognizes_first_added_revert_text() {
        let err = ChainError::Rpc { method: "eth_sendRawTransaction", message: "execution reverted: firstAdded mismatch".to_string() };
        assert!(matches!(classify_signature_mismatch(err), ChainError::SignatureMismatch(_)));
    }

    #[test]
    fn leaves_unrelated_errors_untouched() {
        let err = ChainError::Rpc { method: "eth_sendRawTransaction", message: "insufficient funds".to_string() };
        assert!(matches!(classify_signature_mismatch(err), ChainError::Rpc { .. }));
    }
}
