//! The commP task-queue handler: drains [`crate::pieces::COMMP_QUEUE`]
//! jobs the piece-upload path enqueues, resolves the real piece CID for the
//! uploaded blob, and repoints the blob's `pdp_piece_refs` rows onto it.

use crate::pieces::CommpJobPayload;
use pdp_db::PdpDb;
use pdp_resolver::CommpPipeline;
use pdp_store::Digest;
use pdp_tasks::handler::{Outcome, TaskHandler};
use std::sync::Arc;

pub struct CommpJobHandler {
    db: PdpDb,
    pipeline: Arc<CommpPipeline>,
}

impl CommpJobHandler {
    pub fn new(db: PdpDb, pipeline: Arc<CommpPipeline>) -> Self {
        Self { db, pipeline }
    }
}

#[async_trait::async_trait]
impl TaskHandler for CommpJobHandler {
    async fn handle(&self, payload: &[u8]) -> Outcome {
        let job: CommpJobPayload = match serde_json::from_slice(payload) {
            Ok(job) => job,
            Err(err) => return Outcome::Permanent(format!("malformed commp job payload: {err}")),
        };

        let blob_mhash_bytes = match hex::decode(&job.blob_mhash) {
            Ok(bytes) => bytes,
            Err(err) => return Outcome::Permanent(format!("malformed blob multihash: {err}")),
        };
        let digest = match Digest::from_multihash_bytes(&blob_mhash_bytes) {
            Some(digest) => digest,
            None => return Outcome::Permanent("malformed blob multihash".to_string()),
        };

        let result = match self.pipeline.compute(digest, job.size).await {
            Ok(result) => result,
            Err(err) => return Outcome::Retry(err.to_string()),
        };

        match self
            .db
            .update_piece_refs_cid_for_parked_piece(job.blob_mhash, result.piece_cid.to_string())
            .await
        {
            Ok(_) => Outcome::Done,
            Err(err) => Outcome::Retry(err.to_string()),
        }
    }
}
