//! Narrow capability interfaces the rest of the workspace calls through.
//! `pdp-core` depends on these traits, not on `RpcChainProvider` directly,
//! so a test
//! double can stand in without touching a real RPC endpoint.

use crate::error::ChainError;
use async_trait::async_trait;

/// Read-only view onto the PDP verifier contract.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn next_piece_id(&self, set_id: u64) -> Result<u64, ChainError>;
    async fn proving_period(&self) -> Result<u64, ChainError>;
    async fn challenge_window(&self) -> Result<u64, ChainError>;
    async fn next_challenge_epoch(&self, set_id: u64) -> Result<u64, ChainError>;
    /// Proof fee with the 3x safety buffer already applied.
    async fn proof_fee(&self) -> Result<u128, ChainError>;
    async fn current_epoch(&self) -> Result<u64, ChainError>;
}

/// Read-only view onto the service-view contract a client registers with.
#[async_trait]
pub trait ServiceView: Send + Sync {
    async fn client_data_set_id(&self, client_address: &str) -> Result<u64, ChainError>;
}

/// Read-only view onto the provider registry.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn is_approved(&self, provider_address: &str) -> Result<bool, ChainError>;
}

/// A recovered ECDSA signature, passed back to the caller for ABI encoding.
#[derive(Debug, Clone)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl EcdsaSignature {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
        out.push(self.v);
        out
    }
}

/// The external EIP-712 signing service, obtaining a signature over
/// business data for each chain operation. Kept separate
/// from the transaction-submission signer: this one signs the business
/// payload (dataset creation, add-pieces, provider registration), the
/// submission signer signs the wrapping transaction.
#[async_trait]
pub trait SigningService: Send + Sync {
    async fn sign_create_data_set(
        &self,
        payee_address: &str,
        nonce: [u8; 32],
        metadata: &[Vec<u8>],
    ) -> Result<EcdsaSignature, ChainError>;

    async fn sign_add_pieces(
        &self,
        client_data_set_id: u64,
        first_added: u64,
        pieces: &[Vec<u8>],
        metadata: &[Vec<u8>],
    ) -> Result<EcdsaSignature, ChainError>;

    async fn sign_register_provider(
        &self,
        name: &str,
        description: &str,
    ) -> Result<EcdsaSignature, ChainError>;
}
