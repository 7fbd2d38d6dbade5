//! Piece allocation, upload, and retrieval, backing the `/pdp/piece*` and
//! `/piece/:cid` routes. The commP computation itself
//! lives in `pdp-resolver`'s `CommpPipeline`; this module owns the
//! surrounding bookkeeping - upload intents, parked pieces and their refs,
//! and the blob digest a client's check hash is verified against.

use crate::error::{CoreError, CoreResult};
use pdp_db::models::{NewParkedPiece, NewParkedPieceRef, NewPdpPieceMhToCommp, NewPdpPieceRef, NewPdpPieceUpload};
use pdp_db::PdpDb;
use pdp_store::{BlobObject, Blobstore, Digest, Stash, VerifyingCopy};
use pdp_tasks::TaskEngine;
use pdp_types::piece::{MH_FR32_SHA256_TRUNC254_PADBINTREE, MH_SHA2_256_TRUNC254_PADDED};
use pdp_types::{padded_size, PdpError, PieceCid, PieceCodec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

/// Maps a check-hash's declared name onto the multihash code the digest is
/// stored and compared under. `sha2-256` is a plain content hash; the other
/// two are already-computed piece commitments (v1/v2), which lets uploads
/// that declare them skip the async commP job entirely.
fn multihash_code_for_name(name: &str) -> CoreResult<u64> {
    match name {
        "sha2-256" => Ok(pdp_store::digest::MH_SHA2_256),
        "sha2-256-trunc254-padded" => Ok(MH_SHA2_256_TRUNC254_PADDED),
        "fr32-sha256-trunc254-padbintree" => Ok(MH_FR32_SHA256_TRUNC254_PADBINTREE),
        other => Err(CoreError::InvalidInput(format!("unsupported check hash name {other}"))),
    }
}

/// Builds the piece CID a declared v1/v2 check commitment already encodes,
/// without reading the uploaded bytes back. Mirrors the conversion
/// `CommpPipeline` runs when it's handed a blob already keyed under one of
/// these codecs.
fn piece_cid_from_declared_commitment(digest: &Digest, raw_size: u64) -> CoreResult<PieceCid> {
    let mut commitment = [0u8; 32];
    let len = digest.bytes.len().min(32);
    commitment[..len].copy_from_slice(&digest.bytes[..len]);
    let padded = padded_size(raw_size);
    Ok(PieceCid::v2(commitment, padded)?)
}

/// `{name, hash, size}` from a `POST /pdp/piece` body: a client's
/// claim about the bytes it's about to upload, checked as they arrive.
#[derive(Debug, Clone, Deserialize)]
pub struct PieceCheck {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocateResult {
    pub allocated: bool,
    pub piece_cid: Option<String>,
    pub upload_id: Option<Uuid>,
}

/// The commP task-engine queue name, registered by `pdp-host` at startup.
pub const COMMP_QUEUE: &str = "commp";

pub struct PieceService {
    db: PdpDb,
    store: Arc<Blobstore>,
    stash: Stash,
    tasks: Arc<TaskEngine>,
    max_unpadded_size: u64,
}

impl PieceService {
    pub fn new(db: PdpDb, store: Arc<Blobstore>, stash: Stash, tasks: Arc<TaskEngine>, max_unpadded_size: u64) -> Self {
        Self { db, store, stash, tasks, max_unpadded_size }
    }

    fn check_digest(check: &PieceCheck) -> CoreResult<Digest> {
        let code = multihash_code_for_name(&check.name)?;
        let bytes = hex::decode(&check.hash)
            .map_err(|e| CoreError::InvalidInput(format!("check hash is not hex: {e}")))?;
        Ok(Digest::new(code, bytes))
    }

    /// `AllocatePiece(service, check, notifyUrl)`. Dedupes against an
    /// already-complete parked piece with the same digest; otherwise
    /// creates an upload intent the client PUTs bytes against.
    pub async fn allocate(
        &self,
        service: &str,
        check: PieceCheck,
        notify_url: Option<String>,
    ) -> CoreResult<AllocateResult> {
        if check.size == 0 {
            return Err(CoreError::InvalidInput("piece size must be non-zero".to_string()));
        }
        if check.size > self.max_unpadded_size {
            return Err(CoreError::InvalidInput(format!(
                "piece size {} exceeds the maximum unpadded size {}",
                check.size, self.max_unpadded_size
            )));
        }

        let digest = Self::check_digest(&check)?;
        if let Some(existing) = self
            .db
            .get_commp_mapping(digest.storage_key(), check.size as i64)
            .await
            .map_err(CoreError::Db)?
        {
            return Ok(AllocateResult { allocated: false, piece_cid: Some(existing.commp), upload_id: None });
        }

        let upload = self
            .db
            .create_upload(NewPdpPieceUpload {
                id: Uuid::new_v4(),
                service: service.to_string(),
                piece_cid: None,
                notify_url,
                check_hash_codec: check.name.clone(),
                check_hash: check.hash,
                check_size: check.size as i64,
            })
            .await
            .map_err(CoreError::Db)?;

        Ok(AllocateResult { allocated: true, piece_cid: None, upload_id: Some(upload.id) })
    }

    /// `UploadPiece(uploadId, body)`: streams `body` through a verifying
    /// copy into the stash, promotes verified bytes into the blobstore,
    /// parks the piece, and either queues a commP job (plain blob uploads)
    /// or resolves the piece CID inline (uploads that already declared a
    /// v1/v2 commitment).
    pub async fn upload<R>(&self, upload_id: Uuid, body: R, service: &str) -> CoreResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let upload = self
            .db
            .get_upload(upload_id)
            .await
            .map_err(CoreError::Db)?
            .ok_or_else(|| CoreError::NotFound(format!("no upload intent for {upload_id}")))?;

        let code = multihash_code_for_name(&upload.check_hash_codec)?;
        let digest = Digest::new(code, hex::decode(&upload.check_hash).map_err(|e| {
            CoreError::Other(anyhow::anyhow!("stored check hash is not valid hex: {e}"))
        })?);

        self.stash.ensure_dir().await.map_err(|e| CoreError::Other(e.into()))?;
        let slot_id = Uuid::new_v4();
        let stash_path = self.stash.path_for(&slot_id);
        let stash_file = tokio::fs::File::create(&stash_path).await.map_err(PdpError::from)?;

        let copy = VerifyingCopy::new(vec![digest.clone()], Some(upload.check_size as u64));
        let write_result = copy.run(body, stash_file).await;

        let written = match write_result {
            Ok(written) => written,
            Err(err) => {
                let _ = self.stash.remove(&slot_id).await;
                return Err(CoreError::InvalidInput(format!("upload verification failed: {err}")));
            }
        };

        let promoted = tokio::fs::File::open(&stash_path).await.map_err(PdpError::from)?;
        self.store.put(&digest, promoted).await.map_err(CoreError::Store)?;
        let _ = self.stash.remove(&slot_id).await;

        let parked = self
            .db
            .insert_parked_piece(NewParkedPiece {
                piece_cid: digest.storage_key(),
                piece_padded_size: padded_size(written) as i64,
                piece_raw_size: written as i64,
                long_term: true,
                complete: true,
            })
            .await
            .map_err(CoreError::Db)?;

        let piece_ref = self
            .db
            .insert_parked_piece_ref(NewParkedPieceRef {
                piece_id: parked.id,
                data_url: format!("blob://{}", digest.storage_key()),
                long_term: true,
                data_headers: serde_json::Value::Null,
            })
            .await
            .map_err(CoreError::Db)?;

        self.db
            .insert_pdp_piece_ref(NewPdpPieceRef {
                service: service.to_string(),
                piece_cid: parked.piece_cid.clone(),
                piece_ref: piece_ref.ref_id,
            })
            .await
            .map_err(CoreError::Db)?;

        self.db.delete_upload(upload_id).await.map_err(CoreError::Db)?;

        match PieceCodec::from_multihash_code(digest.code) {
            PieceCodec::V1 | PieceCodec::V2 => {
                // the client already declared a piece commitment; no bytes
                // to hash, so resolve and record it inline instead of
                // bouncing through the commP queue.
                let piece_cid = piece_cid_from_declared_commitment(&digest, written)?;
                self.db
                    .insert_commp_mapping(NewPdpPieceMhToCommp {
                        mhash: digest.storage_key(),
                        size: written as i64,
                        commp: piece_cid.to_string(),
                    })
                    .await
                    .map_err(CoreError::Db)?;
                self.db
                    .update_piece_refs_cid_for_parked_piece(digest.storage_key(), piece_cid.to_string())
                    .await
                    .map_err(CoreError::Db)?;
            }
            PieceCodec::Blob(_) => {
                let payload = serde_json::to_vec(&CommpJobPayload { blob_mhash: digest.storage_key(), size: written })
                    .map_err(|e| CoreError::Other(e.into()))?;
                self.tasks.enqueue(COMMP_QUEUE, payload).await.map_err(CoreError::Db)?;
            }
        }

        Ok(())
    }

    /// `GetPieceByCheck`: the dedup-lookup half of `GET /pdp/piece?name&hash`.
    pub async fn find_existing(&self, check: &PieceCheck) -> CoreResult<Option<String>> {
        let digest = Self::check_digest(check)?;
        let mapping = self
            .db
            .get_commp_mapping(digest.storage_key(), check.size as i64)
            .await
            .map_err(CoreError::Db)?;
        Ok(mapping.map(|m| m.commp))
    }

    /// Opens a stored piece's underlying blob bytes for `GET /piece/:cid`,
    /// given the blob multihash a piece CID resolves to.
    pub async fn open_blob(&self, blob_mhash: &str, range: Option<(u64, u64)>) -> CoreResult<BlobObject> {
        let digest = Digest::from_multihash_bytes(&hex::decode(blob_mhash).map_err(|e| {
            CoreError::InvalidInput(format!("malformed blob multihash: {e}"))
        })?)
        .ok_or_else(|| CoreError::InvalidInput("malformed blob multihash".to_string()))?;
        self.store.get(&digest, range).await.map_err(CoreError::Store)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommpJobPayload {
    pub blob_mhash: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_digest_rejects_non_hex() {
        let check = PieceCheck { name: "sha2-256".to_string(), hash: "not-hex".to_string(), size: 10 };
        assert!(PieceService::check_digest(&check).is_err());
    }

    #[test]
    fn check_digest_rejects_unknown_name() {
        let check = PieceCheck { name: "md5".to_string(), hash: "deadbeef".to_string(), size: 10 };
        assert!(PieceService::check_digest(&check).is_err());
    }

    #[test]
    fn check_digest_dispatches_by_name() {
        let plain = PieceCheck { name: "sha2-256".to_string(), hash: "ab".to_string(), size: 1 };
        assert_eq!(PieceService::check_digest(&plain).unwrap().code, pdp_store::digest::MH_SHA2_256);

        let v1 = PieceCheck { name: "sha2-256-trunc254-padded".to_string(), hash: "ab".to_string(), size: 1 };
        assert_eq!(PieceService::check_digest(&v1).unwrap().code, MH_SHA2_256_TRUNC254_PADDED);

        let v2 = PieceCheck { name: "fr32-sha256-trunc254-padbintree".to_string(), hash: "ab".to_string(), size: 1 };
        assert_eq!(PieceService::check_digest(&v2).unwrap().code, MH_FR32_SHA256_TRUNC254_PADBINTREE);
    }
}
