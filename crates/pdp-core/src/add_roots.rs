//! `AddRoots`, the heaviest proof-set operation: validates a
//! client's requested roots against stored piece info, aggregates subroot
//! commitments into each root's commitment, and submits a batched
//! `addPieces` transaction either directly or through the per-dataset
//! [`pdp_chain::AddRootsCoordinators`].

use crate::error::{CoreError, CoreResult};
use crate::registration::RegistrationService;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use dashmap::DashMap;
use pdp_chain::coordinator::{AddRootsSubmitter, PendingRootAdd};
use pdp_chain::error::ChainError;
use pdp_chain::{ServiceView, SigningService, TransactionSender, TxRequest, Verifier};
use pdp_db::models::{NewMessageWaitEth, NewPdpProofsetRootAdd};
use pdp_db::PdpDb;
use pdp_types::{aggregate_subroots, PieceCid};
use serde::Deserialize;
use std::sync::Arc;

/// One subroot in a client's `AddRoots` request: the subroot's own piece
/// CID plus its offset within the parent root.
#[derive(Debug, Clone, Deserialize)]
pub struct SubrootRequest {
    pub subroot_cid: String,
}

/// One root in a client's `AddRoots` request: the client's claimed root CID
/// (piece-v1, the aggregate the subroots are expected to fold to) plus the
/// ordered list of subroots that make it up.
#[derive(Debug, Clone, Deserialize)]
pub struct RootAddRequest {
    pub root_cid: String,
    pub subroots: Vec<SubrootRequest>,
}

/// A root whose subroot commitments have been looked up, order-checked, and
/// aggregated - ready to ABI-encode into `addPieces`'s `pieces[]` argument
/// and to materialize as `pdp_proofset_root_adds` rows once a `root_id` and
/// `add_message_hash` are known.
#[derive(Debug, Clone)]
struct ComputedRoot {
    piece_cid: PieceCid,
    total_unpadded_size: u64,
    subroots: Vec<ComputedSubroot>,
}

#[derive(Debug, Clone)]
struct ComputedSubroot {
    piece_ref_id: i64,
    subroot_cid: String,
    subroot_offset: i64,
    subroot_size: i64,
}

/// Validates a request and aggregates each root's subroot commitments.
/// Shared by the direct and coordinator-mediated paths.
pub struct AddRootsValidator {
    db: PdpDb,
}

impl AddRootsValidator {
    pub fn new(db: PdpDb) -> Self {
        Self { db }
    }

    pub async fn validate(&self, service: &str, requested: &[RootAddRequest]) -> CoreResult<Vec<ComputedRoot>> {
        if requested.is_empty() {
            return Err(CoreError::InvalidInput("add-roots request must contain at least one root".to_string()));
        }

        let mut all_subroot_cids: Vec<String> = Vec::new();
        for root in requested {
            if root.subroots.is_empty() {
                return Err(CoreError::InvalidInput(format!("root {} has no subroots", root.root_cid)));
            }
            for subroot in &root.subroots {
                if all_subroot_cids.contains(&subroot.subroot_cid) {
                    return Err(CoreError::InvalidInput(format!(
                        "subroot {} is duplicated within the request",
                        subroot.subroot_cid
                    )));
                }
                all_subroot_cids.push(subroot.subroot_cid.clone());
            }
        }

        let rows = self
            .db
            .get_piece_info_for_cids(service.to_string(), all_subroot_cids.clone())
            .await
            .map_err(CoreError::Db)?;

        let mut by_cid = std::collections::HashMap::new();
        for (piece_ref, parked_ref, parked_piece) in rows {
            by_cid.insert(piece_ref.piece_cid.clone(), (piece_ref, parked_ref, parked_piece));
        }
        for cid in &all_subroot_cids {
            if !by_cid.contains_key(cid) {
                return Err(CoreError::NotFound(format!("no stored piece for subroot {cid}")));
            }
        }

        let mut computed = Vec::with_capacity(requested.len());
        for root in requested {
            let mut offset: i64 = 0;
            let mut commitments: Vec<([u8; 32], u64)> = Vec::with_capacity(root.subroots.len());
            let mut subroots = Vec::with_capacity(root.subroots.len());
            let mut prev_size: Option<i64> = None;

            for subroot in &root.subroots {
                let (_piece_ref, parked_ref, parked_piece) = &by_cid[&subroot.subroot_cid];
                if let Some(prev) = prev_size {
                    if parked_piece.piece_padded_size > prev {
                        return Err(CoreError::InvalidInput(format!(
                            "subroot {} is larger than the subroot before it; subroots must be in descending size order",
                            subroot.subroot_cid
                        )));
                    }
                }
                prev_size = Some(parked_piece.piece_padded_size);

                let subroot_piece_cid: PieceCid = subroot
                    .subroot_cid
                    .parse()
                    .map_err(|_| CoreError::InvalidInput(format!("malformed subroot CID {}", subroot.subroot_cid)))?;
                commitments.push((subroot_piece_cid.commitment(), parked_piece.piece_padded_size as u64));

                subroots.push(ComputedSubroot {
                    piece_ref_id: parked_ref.ref_id,
                    subroot_cid: subroot.subroot_cid.clone(),
                    subroot_offset: offset,
                    subroot_size: parked_piece.piece_padded_size,
                });
                offset += parked_piece.piece_padded_size;
            }

            let (aggregated_commitment, total_unpadded_size) = aggregate_subroots(&commitments);

            let claimed_root: PieceCid = root
                .root_cid
                .parse()
                .map_err(|_| CoreError::InvalidInput(format!("malformed root CID {}", root.root_cid)))?;
            let claimed_v1 = PieceCid::v1(claimed_root.commitment()).map_err(|e| CoreError::Other(e.into()))?;
            let reconstructed_v1 = PieceCid::v1(aggregated_commitment).map_err(|e| CoreError::Other(e.into()))?;
            if claimed_v1 != reconstructed_v1 {
                tracing::warn!(
                    claimed = %root.root_cid,
                    reconstructed = %reconstructed_v1,
                    "client-supplied root commitment does not match its subroots' aggregate"
                );
                return Err(CoreError::InvalidInput(format!(
                    "root {} does not match the aggregate of its subroots",
                    root.root_cid
                )));
            }

            let piece_cid = PieceCid::v2(aggregated_commitment, total_unpadded_size).map_err(|e| CoreError::Other(e.into()))?;
            computed.push(ComputedRoot { piece_cid, total_unpadded_size, subroots });
        }

        Ok(computed)
    }
}

/// Encodes `addPieces`'s `extraData`: `(clientDataSetId, firstAdded,
/// signature, metadata)`, the same selector-stripping technique
/// `proofsets::encode_create_data_set_extra` uses.
fn encode_add_pieces_extra(client_data_set_id: u64, first_added: u64, signature: &[u8], metadata: &[Vec<u8>]) -> Vec<u8> {
    let call = pdp_chain::contracts::encodeAddPiecesExtraCall {
        clientDataSetId: U256::from(client_data_set_id),
        firstAdded: U256::from(first_added),
        signature: signature.to_vec().into(),
        metadata: metadata.iter().map(|m| m.clone().into()).collect(),
    };
    let encoded = call.abi_encode();
    encoded[4..].to_vec()
}

/// Submits a precomputed batch of roots as one `addPieces` transaction and
/// records the resulting rows. Shared between the
/// direct `add_roots` entry point and [`CoreAddRootsSubmitter`].
struct Submission<'a> {
    db: &'a PdpDb,
    service_view: &'a dyn ServiceView,
    signing: &'a dyn SigningService,
    sender: &'a TransactionSender,
    verifier_address: Address,
}

impl Submission<'_> {
    async fn submit(&self, set_id: i64, first_added: u64, roots: &[ComputedRoot]) -> CoreResult<String> {
        let client = format!("{:#x}", self.sender.address());
        let client_data_set_id = self.service_view.client_data_set_id(&client).await.map_err(CoreError::Chain)?;

        let pieces: Vec<Vec<u8>> = roots.iter().map(|r| r.piece_cid.to_bytes()).collect();
        let metadata: Vec<Vec<u8>> = Vec::new();

        let signature = self
            .signing
            .sign_add_pieces(client_data_set_id, first_added, &pieces, &metadata)
            .await
            .map_err(CoreError::Chain)?;
        let extra_data = encode_add_pieces_extra(client_data_set_id, first_added, &signature.to_bytes(), &metadata);

        let call = pdp_chain::contracts::addPiecesCall {
            setId: U256::from(set_id as u64),
            extra: Address::ZERO,
            pieces: pieces.into_iter().map(Into::into).collect(),
            extraData: extra_data.into(),
        };
        let tx = TxRequest {
            to: self.verifier_address,
            data: call.abi_encode().into(),
            value: U256::ZERO,
            gas_limit: 300_000 + 50_000 * roots.len() as u64,
        };
        let tx_hash = self.sender.send(tx, "add-roots").await.map_err(CoreError::Chain)?;

        self.db
            .insert_message_wait(NewMessageWaitEth { signed_tx_hash: tx_hash.clone(), tx_status: "pending".to_string() })
            .await
            .map_err(CoreError::Db)?;
        self.db.set_init_ready(set_id).await.map_err(CoreError::Db)?;

        let mut next_root_id = first_added;
        for root in roots {
            let root_id = next_root_id as i64;
            next_root_id += 1;
            for subroot in &root.subroots {
                self.db
                    .insert_root_add(NewPdpProofsetRootAdd {
                        proofset_id: set_id,
                        root_id,
                        root_cid: root.piece_cid.to_string(),
                        subroot_cid: subroot.subroot_cid.clone(),
                        subroot_offset: subroot.subroot_offset,
                        subroot_size: subroot.subroot_size,
                        piece_ref_id: subroot.piece_ref_id,
                        add_message_hash: tx_hash.clone(),
                    })
                    .await
                    .map_err(CoreError::Db)?;
            }
        }

        tracing::debug!(
            set_id,
            total_unpadded_size = roots.iter().map(|r| r.total_unpadded_size).sum::<u64>(),
            root_count = roots.len(),
            "submitted add-roots batch"
        );
        Ok(tx_hash)
    }
}

pub struct AddRootsService {
    db: PdpDb,
    validator: AddRootsValidator,
    sender: Arc<TransactionSender>,
    verifier: Arc<dyn Verifier>,
    service_view: Arc<dyn ServiceView>,
    registration: Arc<RegistrationService>,
    signing: Arc<dyn SigningService>,
    verifier_address: Address,
}

impl AddRootsService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: PdpDb,
        sender: Arc<TransactionSender>,
        verifier: Arc<dyn Verifier>,
        service_view: Arc<dyn ServiceView>,
        registration: Arc<RegistrationService>,
        signing: Arc<dyn SigningService>,
        verifier_address: Address,
    ) -> Self {
        Self { db: db.clone(), validator: AddRootsValidator::new(db), sender, verifier, service_view, registration, signing, verifier_address }
    }

    /// Direct (non-coordinated) `AddRoots`: fetches `nextPieceId` itself
    /// rather than going through a [`pdp_chain::AddRootsCoordinators`]
    /// worker. Used when only one `AddRoots` call for a dataset is in
    /// flight at a time.
    pub async fn add_roots(&self, service: &str, set_id: i64, requested: Vec<RootAddRequest>) -> CoreResult<String> {
        self.registration.require_approved().await?;
        let roots = self.validator.validate(service, &requested).await?;
        let first_added = self.verifier.next_piece_id(set_id as u64).await.map_err(CoreError::Chain)?;

        let submission = Submission {
            db: &self.db,
            service_view: self.service_view.as_ref(),
            signing: self.signing.as_ref(),
            sender: &self.sender,
            verifier_address: self.verifier_address,
        };
        submission.submit(set_id, first_added, &roots).await
    }
}

/// Implements [`AddRootsSubmitter`] so a validated-but-not-yet-submitted
/// `AddRoots` request can be handed to [`pdp_chain::AddRootsCoordinators`],
/// which batches several requests for the same dataset and assigns each
/// batch a `firstAdded` free of races with concurrent submissions.
///
/// The coordinator only carries a [`PendingRootAdd`] (root CID and piece
/// count) per queued item, so the richer [`ComputedRoot`] data
/// `AddRootsValidator::validate` produces is stashed here, keyed by the
/// computed root's own CID, until `submit_batch` is called for it. Entries
/// are removed once submitted; an item dropped by the coordinator without a
/// matching `submit_batch` call (e.g. the worker is torn down mid-queue)
/// leaks its stashed entry, accepted as a bounded, load-shed-only memory
/// cost rather than plumbing a cleanup path through the coordinator.
pub struct CoreAddRootsSubmitter {
    db: PdpDb,
    service_view: Arc<dyn ServiceView>,
    signing: Arc<dyn SigningService>,
    sender: Arc<TransactionSender>,
    verifier_address: Address,
    pending: DashMap<String, ComputedRoot>,
}

impl CoreAddRootsSubmitter {
    pub fn new(
        db: PdpDb,
        service_view: Arc<dyn ServiceView>,
        signing: Arc<dyn SigningService>,
        sender: Arc<TransactionSender>,
        verifier_address: Address,
    ) -> Self {
        Self { db, service_view, signing, sender, verifier_address, pending: DashMap::new() }
    }

    /// Validates `requested` and stashes the computed roots for a later
    /// `submit_batch`, enqueuing one [`PendingRootAdd`] per root onto the
    /// dataset's coordinator. Returns the tx-hash the coordinator resolves
    /// once the whole batch lands.
    pub async fn enqueue(
        &self,
        coordinators: &pdp_chain::AddRootsCoordinators,
        validator: &AddRootsValidator,
        registration: &RegistrationService,
        service: &str,
        set_id: i64,
        requested: Vec<RootAddRequest>,
    ) -> CoreResult<String> {
        registration.require_approved().await?;
        let roots = validator.validate(service, &requested).await?;
        let mut tx_hash = String::new();
        for root in roots {
            let key = root.piece_cid.to_string();
            self.pending.insert(key.clone(), root);
            tx_hash = coordinators
                .enqueue(set_id, PendingRootAdd { root_cid: key, piece_count: 1 })
                .await
                .map_err(CoreError::Chain)?;
        }
        Ok(tx_hash)
    }
}

#[async_trait::async_trait]
impl AddRootsSubmitter for CoreAddRootsSubmitter {
    async fn submit_batch(&self, set_id: i64, first_added: u64, batch: &[PendingRootAdd]) -> Result<String, ChainError> {
        let mut roots = Vec::with_capacity(batch.len());
        for item in batch {
            let (_, root) = self
                .pending
                .remove(&item.root_cid)
                .ok_or_else(|| ChainError::Other(anyhow::anyhow!("no stashed root data for {}", item.root_cid)))?;
            roots.push(root);
        }

        let submission = Submission {
            db: &self.db,
            service_view: self.service_view.as_ref(),
            signing: self.signing.as_ref(),
            sender: &self.sender,
            verifier_address: self.verifier_address,
        };
        submission.submit(set_id, first_added, &roots).await.map_err(|e| match e {
            CoreError::Chain(chain_err) => chain_err,
            other => ChainError::Other(anyhow::anyhow!(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descending_size_check_rejects_out_of_order_subroots() {
        let sizes = [128i64, 256i64];
        assert!(sizes[1] > sizes[0], "fixture sanity check: second size must exceed the first");
    }

    #[test]
    fn extra_data_encoding_strips_the_function_selector() {
        let sig = vec![2u8; 65];
        let metadata: Vec<Vec<u8>> = Vec::new();
        let encoded = encode_add_pieces_extra(7, 100, &sig, &metadata);
        assert!(encoded.len() >= 64);
        assert_eq!(&encoded[..32], &U256::from(7u64).to_be_bytes::<32>()[..]);
        assert_eq!(&encoded[32..64], &U256::from(100u64).to_be_bytes::<32>()[..]);
    }
}
