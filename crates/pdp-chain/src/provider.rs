//! The concrete chain provider: batched JSON-RPC calls over an alloy HTTP
//! transport, one client/batch per call group, aimed at
//! `eth_call`/`eth_sendRawTransaction` and the three PDP contracts.

use crate::contracts::{
    challengeWindowCall, clientDataSetIdCall, isApprovedProviderCall, nextChallengeEpochCall,
    nextPieceIdCall, proofFeeCall, provingPeriodCall,
};
use crate::error::ChainError;
use crate::traits::{Registry, ServiceView, Verifier};
use alloy_primitives::{Address, Bytes};
use alloy_provider::{ProviderBuilder, ReqwestProvider, RootProvider};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_sol_types::SolCall;
use alloy_transport_http::Http;
use pdp_types::ServiceConfig;
use reqwest_alloy::Client;
use serde::Serialize;
use std::str::FromStr;

#[derive(Serialize)]
struct CallObject {
    to: Address,
    data: Bytes,
}

pub struct RpcChainProvider {
    #[allow(dead_code)]
    provider: ReqwestProvider,
    client: RpcClient<Http<Client>>,
    verifier: Address,
    service_view: Address,
    registry: Address,
}

/// Safety multiplier applied on top of the quoted proof fee.
const PROOF_FEE_BUFFER: u128 = 3;

impl RpcChainProvider {
    pub fn new(cfg: &ServiceConfig) -> Result<Self, ChainError> {
        let url = reqwest::Url::parse(&cfg.chain.rpc_url)
            .map_err(|e| ChainError::Other(anyhow::anyhow!("invalid rpc url: {e}")))?;
        let verifier = Address::from_str(&cfg.chain.verifier_address)
            .map_err(|_| ChainError::InvalidAddress(cfg.chain.verifier_address.clone()))?;
        let service_view = Address::from_str(&cfg.chain.service_view_address)
            .map_err(|_| ChainError::InvalidAddress(cfg.chain.service_view_address.clone()))?;
        let registry = Address::from_str(&cfg.chain.registry_address)
            .map_err(|_| ChainError::InvalidAddress(cfg.chain.registry_address.clone()))?;

        Ok(Self {
            provider: ProviderBuilder::new().on_provider(RootProvider::new_http(url.clone())),
            client: ClientBuilder::default().http(url),
            verifier,
            service_view,
            registry,
        })
    }

    /// Single `eth_call` dispatched through a one-request batch via the
    /// RPC client's `new_batch()` / `add_call` / `send()` dance.
    async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, Bytes>("eth_call", &(CallObject { to, data }, "latest"))
            .map_err(|e| ChainError::Rpc { method: "eth_call", message: e.to_string() })?;
        let request = Box::pin(request);
        batch.send().await.map_err(|e| ChainError::Rpc { method: "eth_call", message: e.to_string() })?;
        request.await.map_err(|e| ChainError::Rpc { method: "eth_call", message: e.to_string() })
    }

    /// The current chain tip height, polled by the scheduler.
    pub async fn block_number(&self) -> Result<u64, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, alloy_primitives::U64>("eth_blockNumber", &())
            .map_err(|e| ChainError::Rpc { method: "eth_blockNumber", message: e.to_string() })?;
        let request = Box::pin(request);
        batch.send().await.map_err(|e| ChainError::Rpc { method: "eth_blockNumber", message: e.to_string() })?;
        let height = request.await.map_err(|e| ChainError::Rpc { method: "eth_blockNumber", message: e.to_string() })?;
        Ok(height.to::<u64>())
    }

    pub async fn transaction_count(&self, address: Address) -> Result<u64, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, alloy_primitives::U64>("eth_getTransactionCount", &(address, "pending"))
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionCount", message: e.to_string() })?;
        let request = Box::pin(request);
        batch
            .send()
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionCount", message: e.to_string() })?;
        let nonce = request
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionCount", message: e.to_string() })?;
        Ok(nonce.to::<u64>())
    }

    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, alloy_primitives::U128>("eth_gasPrice", &())
            .map_err(|e| ChainError::Rpc { method: "eth_gasPrice", message: e.to_string() })?;
        let request = Box::pin(request);
        batch.send().await.map_err(|e| ChainError::Rpc { method: "eth_gasPrice", message: e.to_string() })?;
        let price = request.await.map_err(|e| ChainError::Rpc { method: "eth_gasPrice", message: e.to_string() })?;
        Ok(price.to::<u128>())
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<u128, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, alloy_primitives::U128>("eth_maxPriorityFeePerGas", &())
            .map_err(|e| ChainError::Rpc { method: "eth_maxPriorityFeePerGas", message: e.to_string() })?;
        let request = Box::pin(request);
        batch
            .send()
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_maxPriorityFeePerGas", message: e.to_string() })?;
        let tip = request
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_maxPriorityFeePerGas", message: e.to_string() })?;
        Ok(tip.to::<u128>())
    }

    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<String, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, alloy_primitives::B256>("eth_sendRawTransaction", &(raw,))
            .map_err(|e| ChainError::Rpc { method: "eth_sendRawTransaction", message: e.to_string() })?;
        let request = Box::pin(request);
        batch
            .send()
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_sendRawTransaction", message: e.to_string() })?;
        let hash = request
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_sendRawTransaction", message: e.to_string() })?;
        Ok(format!("{hash:#x}"))
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> Result<Option<serde_json::Value>, ChainError> {
        let mut batch = self.client.new_batch();
        let request = batch
            .add_call::<_, Option<serde_json::Value>>("eth_getTransactionReceipt", &(tx_hash,))
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionReceipt", message: e.to_string() })?;
        let request = Box::pin(request);
        batch
            .send()
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionReceipt", message: e.to_string() })?;
        request
            .await
            .map_err(|e| ChainError::Rpc { method: "eth_getTransactionReceipt", message: e.to_string() })
    }

    pub fn verifier_address(&self) -> Address {
        self.verifier
    }

    pub fn registry_address(&self) -> Address {
        self.registry
    }
}

#[async_trait::async_trait]
impl Verifier for RpcChainProvider {
    async fn next_piece_id(&self, set_id: u64) -> Result<u64, ChainError> {
        let call = nextPieceIdCall { setId: alloy_primitives::U256::from(set_id) };
        let data = self.eth_call(self.verifier, call.abi_encode().into()).await?;
        let decoded = <nextPieceIdCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "nextPieceId", message: e.to_string() })?;
        Ok(decoded._0.to::<u64>())
    }

    async fn proving_period(&self) -> Result<u64, ChainError> {
        let call = provingPeriodCall {};
        let data = self.eth_call(self.verifier, call.abi_encode().into()).await?;
        let decoded = <provingPeriodCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "provingPeriod", message: e.to_string() })?;
        Ok(decoded._0.to::<u64>())
    }

    async fn challenge_window(&self) -> Result<u64, ChainError> {
        let call = challengeWindowCall {};
        let data = self.eth_call(self.verifier, call.abi_encode().into()).await?;
        let decoded = <challengeWindowCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "challengeWindow", message: e.to_string() })?;
        Ok(decoded._0.to::<u64>())
    }

    async fn next_challenge_epoch(&self, set_id: u64) -> Result<u64, ChainError> {
        let call = nextChallengeEpochCall { setId: alloy_primitives::U256::from(set_id) };
        let data = self.eth_call(self.verifier, call.abi_encode().into()).await?;
        let decoded = <nextChallengeEpochCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "nextChallengeEpoch", message: e.to_string() })?;
        Ok(decoded._0.to::<u64>())
    }

    async fn proof_fee(&self) -> Result<u128, ChainError> {
        let call = proofFeeCall {};
        let data = self.eth_call(self.verifier, call.abi_encode().into()).await?;
        let decoded = <proofFeeCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "proofFee", message: e.to_string() })?;
        Ok(decoded._0.to::<u128>() * PROOF_FEE_BUFFER)
    }

    async fn current_epoch(&self) -> Result<u64, ChainError> {
        self.block_number().await
    }
}

#[async_trait::async_trait]
impl ServiceView for RpcChainProvider {
    async fn client_data_set_id(&self, client_address: &str) -> Result<u64, ChainError> {
        let client = Address::from_str(client_address)
            .map_err(|_| ChainError::InvalidAddress(client_address.to_string()))?;
        let call = clientDataSetIdCall { client };
        let data = self.eth_call(self.service_view, call.abi_encode().into()).await?;
        let decoded = <clientDataSetIdCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "clientDataSetId", message: e.to_string() })?;
        Ok(decoded._0.to::<u64>())
    }
}

#[async_trait::async_trait]
impl Registry for RpcChainProvider {
    async fn is_approved(&self, provider_address: &str) -> Result<bool, ChainError> {
        let provider = Address::from_str(provider_address)
            .map_err(|_| ChainError::InvalidAddress(provider_address.to_string()))?;
        let call = isApprovedProviderCall { provider };
        let data = self.eth_call(self.registry, call.abi_encode().into()).await?;
        let decoded = <isApprovedProviderCall as SolCall>::abi_decode_returns(&data, true)
            .map_err(|e| ChainError::Rpc { method: "isApprovedProvider", message: e.to_string() })?;
        Ok(decoded._0)
    }
}
