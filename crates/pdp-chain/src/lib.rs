//! Chain interaction: capability traits, an alloy-backed RPC provider, the
//! transaction sender, the tip-poll scheduler, and the add-roots
//! coordinator.

pub mod confirm;
pub mod contracts;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod provider;
pub mod receipt_watcher;
pub mod scheduler;
pub mod sender;
pub mod signer;
pub mod traits;

pub use coordinator::{AddRootsCoordinators, AddRootsSubmitter, DatasetCoordinator, PendingRootAdd};
pub use error::ChainError;
pub use provider::RpcChainProvider;
pub use receipt_watcher::ReceiptWatcher;
pub use scheduler::{ChainListener, ChainScheduler};
pub use sender::{TransactionSender, TxRequest};
pub use signer::HttpSigningService;
pub use traits::{EcdsaSignature, Registry, ServiceView, SigningService, Verifier};
