//! Shared domain types for the PDP storage provider core.
//!
//! A dependency-light crate of types and pure functions that every other
//! crate in the workspace builds on, with no knowledge of HTTP, the
//! database, or the chain.

pub mod commp;
pub mod config;
pub mod error;
pub mod piece;

pub use commp::{aggregate_subroots, commitment_of_bytes, padded_size, tree_height, MAX_MEMTREE_UNPADDED_SIZE};
pub use config::ServiceConfig;
pub use error::{ErrorKind, PdpError, PdpResult};
pub use piece::{PieceCid, PieceCodec};
