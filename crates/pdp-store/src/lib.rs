//! The piece/blob data plane: content-addressed storage, staged uploads,
//! and streaming digest verification.

pub mod blobstore;
pub mod digest;
pub mod stash;
pub mod verify;

pub use blobstore::{BlobObject, Blobstore, StoreError};
pub use digest::Digest;
pub use stash::{Stash, StashError};
pub use verify::{VerifyError, VerifyingCopy};
