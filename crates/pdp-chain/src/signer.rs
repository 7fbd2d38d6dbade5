//! An HTTP client for the external EIP-712 signing service: this crate
//! packs the payload, the service holds the key and returns a signature,
//! keeping "the node that knows the business data" separate from "the
//! vault that holds keys".

use crate::error::ChainError;
use crate::traits::{EcdsaSignature, SigningService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct HttpSigningService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSigningService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }

    async fn post(&self, path: &str, body: impl Serialize) -> Result<EcdsaSignature, ChainError> {
        let url = format!("{}{}", self.base_url, path);
        let response: SignResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChainError::Signing(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        response.into_signature()
    }
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

impl SignResponse {
    fn into_signature(self) -> Result<EcdsaSignature, ChainError> {
        let hex_str = self.signature.trim_start_matches("0x");
        let bytes = hex::decode(hex_str).map_err(|e| ChainError::Signing(e.to_string()))?;
        if bytes.len() != 65 {
            return Err(ChainError::Signing(format!("expected a 65 byte signature, got {}", bytes.len())));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(EcdsaSignature { r, s, v: bytes[64] })
    }
}

#[derive(Serialize)]
struct CreateDataSetPayload<'a> {
    payee_address: &'a str,
    nonce: String,
    metadata: &'a [Vec<u8>],
}

#[derive(Serialize)]
struct AddPiecesPayload<'a> {
    client_data_set_id: u64,
    first_added: u64,
    pieces: &'a [Vec<u8>],
    metadata: &'a [Vec<u8>],
}

#[derive(Serialize)]
struct RegisterProviderPayload<'a> {
    name: &'a str,
    description: &'a str,
}

#[async_trait]
impl SigningService for HttpSigningService {
    async fn sign_create_data_set(
        &self,
        payee_address: &str,
        nonce: [u8; 32],
        metadata: &[Vec<u8>],
    ) -> Result<EcdsaSignature, ChainError> {
        self.post(
            "/sign/create-data-set",
            CreateDataSetPayload { payee_address, nonce: format!("0x{}", hex::encode(nonce)), metadata },
        )
        .await
    }

    async fn sign_add_pieces(
        &self,
        client_data_set_id: u64,
        first_added: u64,
        pieces: &[Vec<u8>],
        metadata: &[Vec<u8>],
    ) -> Result<EcdsaSignature, ChainError> {
        self.post(
            "/sign/add-pieces",
            AddPiecesPayload { client_data_set_id, first_added, pieces, metadata },
        )
        .await
    }

    async fn sign_register_provider(
        &self,
        name: &str,
        description: &str,
    ) -> Result<EcdsaSignature, ChainError> {
        self.post("/sign/register-provider", RegisterProviderPayload { name, description }).await
    }
}
