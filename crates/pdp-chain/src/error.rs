use thiserror::Error;

/// Failure modes for every chain-facing operation.
///
/// `SignatureMismatch` is broken out from `Rpc` because the add-roots
/// coordinator treats it specially: a resync-and-retry trigger rather than
/// a surfaced failure.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest_alloy::Error),
    #[error("rpc call {method} failed: {message}")]
    Rpc { method: &'static str, message: String },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("signing service error: {0}")]
    Signing(String),
    #[error("on-chain signature mismatch, resync required: {0}")]
    SignatureMismatch(String),
    #[error("transaction {tx_hash} failed on-chain")]
    TransactionReverted { tx_hash: String },
    #[error("timed out waiting for confirmation of {tx_hash}")]
    ConfirmationTimeout { tx_hash: String },
    #[error("database error: {0}")]
    Db(#[from] pdp_db::DbError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ChainError> for pdp_types::PdpError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::SignatureMismatch(msg) => pdp_types::PdpError::conflict(msg),
            ChainError::TransactionReverted { tx_hash } => {
                pdp_types::PdpError::conflict(format!("transaction {tx_hash} reverted"))
            }
            other => pdp_types::PdpError::internal(anyhow::anyhow!(other.to_string())),
        }
    }
}
