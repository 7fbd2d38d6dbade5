//! The node's business logic: proof-set workflows,
//! piece ingestion, provider lifecycle, and the facade that ties them to
//! the blobstore, resolver, commP pipeline, and task engine below.

pub mod add_roots;
pub mod commp;
pub mod error;
pub mod pieces;
pub mod proofsets;
pub mod registration;
pub mod service;

pub use add_roots::{AddRootsService, AddRootsValidator, CoreAddRootsSubmitter, RootAddRequest, SubrootRequest};
pub use commp::CommpJobHandler;
pub use error::{CoreError, CoreResult};
pub use pieces::{AllocateResult, PieceCheck, PieceService, COMMP_QUEUE};
pub use proofsets::{ProofSetCreateStatus, ProofSetService, ProofSetState, ProofSetWithRoots};
pub use registration::{ProviderStatus, RegistrationService};
pub use service::PdpService;
