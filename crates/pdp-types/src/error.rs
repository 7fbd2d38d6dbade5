use serde::Serialize;

/// The coarse-grained classification used throughout the core.
///
/// Every crate boundary error carries one of these so the HTTP adapter can
/// map it to a status code without knowing the originating component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Conflict,
    Internal,
}

/// The standardized error type shared by every component of the core.
///
/// Individual crates (`pdp-db`, `pdp-chain`, `pdp-core`, ...) define their
/// own `thiserror` enums for their own failure modes and convert into this
/// one at their public boundary.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct PdpError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

pub type PdpResult<T> = Result<T, PdpError>;

impl PdpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Self {
            kind: ErrorKind::Internal,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl From<std::io::Error> for PdpError {
    fn from(err: std::io::Error) -> Self {
        PdpError::internal(err)
    }
}
