//! Provider lifecycle: `RegisterProvider`, `GetProviderStatus`,
//! `IsApproved`. Mirrors `proofsets::ProofSetService`'s tx-plus-row pattern.

use crate::error::{CoreError, CoreResult};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use pdp_chain::{Registry, SigningService, TransactionSender, TxRequest};
use pdp_db::models::{NewMessageWaitEth, NewPdpProviderRegistration};
use pdp_db::PdpDb;
use serde::Serialize;
use std::sync::Arc;

pub struct RegistrationService {
    db: PdpDb,
    sender: Arc<TransactionSender>,
    registry: Arc<dyn Registry>,
    signing: Arc<dyn SigningService>,
    registry_address: Address,
}

impl RegistrationService {
    pub fn new(
        db: PdpDb,
        sender: Arc<TransactionSender>,
        registry: Arc<dyn Registry>,
        signing: Arc<dyn SigningService>,
        registry_address: Address,
    ) -> Self {
        Self { db, sender, registry, signing, registry_address }
    }

    /// The single source of truth for "may this provider call
    /// approval-gated operations". `proofsets::ProofSetService` and
    /// `add_roots::AddRootsService` call through here rather than reading
    /// `Registry` directly, so the approval check lives in exactly one
    /// place.
    pub async fn is_approved(&self) -> CoreResult<bool> {
        let address = format!("{:#x}", self.sender.address());
        Ok(self.registry.is_approved(&address).await?)
    }

    pub async fn require_approved(&self) -> CoreResult<()> {
        if !self.is_approved().await? {
            return Err(CoreError::ProviderNotApproved);
        }
        Ok(())
    }

    /// `RegisterProvider(name, description)`: no `extraData`/signature in
    /// the on-chain ABI (`registerProvider(string,string)` takes no bytes
    /// parameter), but this still routes through the external
    /// signing service so that service has a record of every registration
    /// this node has requested.
    pub async fn register_provider(&self, name: &str, description: &str) -> CoreResult<String> {
        let _signature = self.signing.sign_register_provider(name, description).await?;

        let call = pdp_chain::contracts::registerProviderCall {
            name: name.to_string(),
            description: description.to_string(),
        };
        let tx = TxRequest {
            to: self.registry_address,
            data: call.abi_encode().into(),
            value: U256::ZERO,
            gas_limit: 300_000,
        };
        let tx_hash = self.sender.send(tx, "register-provider").await?;

        self.db
            .insert_message_wait(NewMessageWaitEth { signed_tx_hash: tx_hash.clone(), tx_status: "pending".to_string() })
            .await
            .map_err(CoreError::Db)?;
        self.db
            .insert_provider_registration(NewPdpProviderRegistration {
                signed_tx_hash: tx_hash.clone(),
                address: format!("{:#x}", self.sender.address()),
            })
            .await
            .map_err(CoreError::Db)?;

        Ok(tx_hash)
    }

    /// `GetProviderStatus()`: `pending` while the last registration tx is
    /// unconfirmed, `registered` once confirmed and the registry reports
    /// this address approved, `rejected` if confirmed but not approved (the
    /// registry operator declined the registration off-chain).
    pub async fn get_provider_status(&self) -> CoreResult<ProviderStatus> {
        let address = format!("{:#x}", self.sender.address());
        let registration = self
            .db
            .get_latest_provider_registration_by_address(address.clone())
            .await
            .map_err(CoreError::Db)?;

        let Some(registration) = registration else {
            return Ok(ProviderStatus { address, state: "unregistered".to_string(), tx_hash: None });
        };

        let wait = self
            .db
            .get_message_wait(registration.signed_tx_hash.clone())
            .await
            .map_err(CoreError::Db)?
            .ok_or_else(|| CoreError::NotFound(format!("no tx-wait row for {}", registration.signed_tx_hash)))?;

        let state = if wait.tx_status != "confirmed" {
            "pending"
        } else if self.registry.is_approved(&address).await? {
            "registered"
        } else {
            "rejected"
        };

        Ok(ProviderStatus { address, state: state.to_string(), tx_hash: Some(registration.signed_tx_hash) })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub address: String,
    pub state: String,
    pub tx_hash: Option<String>,
}
