use pdp_types::{ErrorKind, PdpError};
use thiserror::Error;

/// Failures from the proof-set/provider workflows and the public facade.
/// Every variant maps onto a [`pdp_types::ErrorKind`] at
/// the crate boundary, the same pattern `pdp_db::DbError`/`pdp_chain::ChainError`
/// follow.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("provider is not approved to call this operation")]
    ProviderNotApproved,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Chain(#[from] pdp_chain::ChainError),
    #[error(transparent)]
    Db(#[from] pdp_db::DbError),
    #[error(transparent)]
    Store(#[from] pdp_store::StoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CoreError> for PdpError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => PdpError::invalid_input(msg),
            CoreError::NotFound(msg) => PdpError::not_found(msg),
            CoreError::ProviderNotApproved => PdpError::unauthorized(err_msg_provider_not_approved()),
            CoreError::Conflict(msg) => PdpError::conflict(msg),
            CoreError::Chain(chain_err) => PdpError::from(chain_err),
            other => PdpError::internal(anyhow::anyhow!(other.to_string())),
        }
    }
}

fn err_msg_provider_not_approved() -> &'static str {
    "provider is not approved to call this operation"
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<PdpError> for CoreError {
    fn from(err: PdpError) -> Self {
        match err.kind {
            ErrorKind::InvalidInput => CoreError::InvalidInput(err.message),
            ErrorKind::NotFound => CoreError::NotFound(err.message),
            ErrorKind::Conflict => CoreError::Conflict(err.message),
            ErrorKind::Unauthorized => CoreError::ProviderNotApproved,
            ErrorKind::Internal => CoreError::Other(err.source.unwrap_or_else(|| anyhow::anyhow!(err.message))),
        }
    }
}
