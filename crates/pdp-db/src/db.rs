//! `PdpDb`: the async facade every other crate talks to. Each method
//! dispatches a `repo` function onto the blocking pool via
//! [`crate::pool::with_conn`] so callers never see diesel's sync API.

use crate::models::*;
use crate::pool::{with_conn, DbError, PgPool};
use crate::repo;
use chrono::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct PdpDb {
    pool: PgPool,
}

impl PdpDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -- pieces -----------------------------------------------------------

    pub async fn insert_parked_piece(&self, new: NewParkedPiece) -> Result<ParkedPiece, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::insert_parked_piece(c, new)).await
    }

    pub async fn mark_piece_complete(&self, piece_id: i64) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::mark_piece_complete(c, piece_id)).await
    }

    pub async fn get_parked_piece_by_cid(&self, cid: String) -> Result<Option<ParkedPiece>, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::get_parked_piece_by_cid(c, &cid)).await
    }

    pub async fn insert_parked_piece_ref(
        &self,
        new: NewParkedPieceRef,
    ) -> Result<ParkedPieceRef, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::insert_parked_piece_ref(c, new)).await
    }

    pub async fn insert_pdp_piece_ref(&self, new: NewPdpPieceRef) -> Result<PdpPieceRef, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::insert_pdp_piece_ref(c, new)).await
    }

    pub async fn get_commp_mapping(
        &self,
        mhash: String,
        size: i64,
    ) -> Result<Option<PdpPieceMhToCommp>, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::get_commp_mapping(c, &mhash, size)).await
    }

    pub async fn get_commp_mapping_by_commp(
        &self,
        commp: String,
    ) -> Result<Option<PdpPieceMhToCommp>, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::get_commp_mapping_by_commp(c, &commp)).await
    }

    pub async fn insert_commp_mapping(
        &self,
        new: NewPdpPieceMhToCommp,
    ) -> Result<PdpPieceMhToCommp, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::insert_commp_mapping(c, new)).await
    }

    pub async fn list_referenced_data_urls(&self) -> Result<Vec<String>, DbError> {
        with_conn(&self.pool, repo::pieces::list_referenced_data_urls).await
    }

    pub async fn update_piece_refs_cid_for_parked_piece(
        &self,
        parked_piece_cid: String,
        new_piece_cid: String,
    ) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| {
            repo::pieces::update_piece_refs_cid_for_parked_piece(c, &parked_piece_cid, &new_piece_cid)
        })
        .await
    }

    pub async fn get_piece_info_for_cids(
        &self,
        service: String,
        cids: Vec<String>,
    ) -> Result<Vec<(PdpPieceRef, ParkedPieceRef, ParkedPiece)>, DbError> {
        with_conn(&self.pool, move |c| repo::pieces::get_piece_info_for_cids(c, &service, &cids)).await
    }

    // -- uploads ------------------------------------------------------------

    pub async fn create_upload(&self, new: NewPdpPieceUpload) -> Result<PdpPieceUpload, DbError> {
        with_conn(&self.pool, move |c| repo::uploads::create_upload(c, new)).await
    }

    pub async fn get_upload(&self, id: Uuid) -> Result<Option<PdpPieceUpload>, DbError> {
        with_conn(&self.pool, move |c| repo::uploads::get_upload(c, id)).await
    }

    pub async fn delete_upload(&self, id: Uuid) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::uploads::delete_upload(c, id)).await
    }

    // -- proof sets -----------------------------------------------------

    pub async fn create_proof_set(&self, new: NewPdpProofSet) -> Result<PdpProofSet, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::create_proof_set(c, new)).await
    }

    pub async fn get_proof_set(&self, id: i64) -> Result<Option<PdpProofSet>, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::get_proof_set(c, id)).await
    }

    pub async fn list_proof_sets(&self, service: String) -> Result<Vec<PdpProofSet>, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::list_proof_sets(c, &service)).await
    }

    pub async fn set_init_ready(&self, id: i64) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::set_init_ready(c, id)).await
    }

    pub async fn insert_root_add(
        &self,
        new: NewPdpProofsetRootAdd,
    ) -> Result<PdpProofsetRootAdd, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::insert_root_add(c, new)).await
    }

    pub async fn graduate_root_add(&self, root_add: PdpProofsetRootAdd) -> Result<PdpProofsetRoot, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::graduate_root_add(c, &root_add)).await
    }

    pub async fn list_roots_for_proofset(&self, proofset_id: i64) -> Result<Vec<PdpProofsetRoot>, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::list_roots_for_proofset(c, proofset_id)).await
    }

    pub async fn remove_root(&self, proofset_id: i64, root_id: i64) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::remove_root(c, proofset_id, root_id)).await
    }

    pub async fn delete_proof_set(&self, id: i64) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::proofsets::delete_proof_set(c, id)).await
    }

    // -- chain ------------------------------------------------------------

    pub async fn insert_message_wait(&self, new: NewMessageWaitEth) -> Result<MessageWaitEth, DbError> {
        with_conn(&self.pool, move |c| repo::chain::insert_message_wait(c, new)).await
    }

    pub async fn get_message_wait(&self, tx_hash: String) -> Result<Option<MessageWaitEth>, DbError> {
        with_conn(&self.pool, move |c| repo::chain::get_message_wait(c, &tx_hash)).await
    }

    pub async fn list_pending_message_waits(&self) -> Result<Vec<MessageWaitEth>, DbError> {
        with_conn(&self.pool, repo::chain::list_pending_message_waits).await
    }

    pub async fn confirm_message(
        &self,
        tx_hash: String,
        success: bool,
        receipt: serde_json::Value,
        block_number: i64,
    ) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| {
            repo::chain::confirm_message(c, &tx_hash, success, receipt, block_number)
        })
        .await
    }

    pub async fn insert_proofset_create(
        &self,
        new: NewPdpProofsetCreate,
    ) -> Result<PdpProofsetCreate, DbError> {
        with_conn(&self.pool, move |c| repo::chain::insert_proofset_create(c, new)).await
    }

    pub async fn get_proofset_create(&self, tx_hash: String) -> Result<Option<PdpProofsetCreate>, DbError> {
        with_conn(&self.pool, move |c| repo::chain::get_proofset_create(c, &tx_hash)).await
    }

    pub async fn insert_provider_registration(
        &self,
        new: NewPdpProviderRegistration,
    ) -> Result<PdpProviderRegistration, DbError> {
        with_conn(&self.pool, move |c| repo::chain::insert_provider_registration(c, new)).await
    }

    pub async fn get_provider_registration(
        &self,
        tx_hash: String,
    ) -> Result<Option<PdpProviderRegistration>, DbError> {
        with_conn(&self.pool, move |c| repo::chain::get_provider_registration(c, &tx_hash)).await
    }

    pub async fn get_latest_provider_registration_by_address(
        &self,
        address: String,
    ) -> Result<Option<PdpProviderRegistration>, DbError> {
        with_conn(&self.pool, move |c| repo::chain::get_latest_provider_registration_by_address(c, &address)).await
    }

    // -- tasks --------------------------------------------------------------

    pub async fn enqueue_task(&self, new: NewTask) -> Result<Task, DbError> {
        with_conn(&self.pool, move |c| repo::tasks::enqueue_task(c, new)).await
    }

    pub async fn lease_next_task(
        &self,
        queue_name: String,
        session_id: String,
        lease_duration: Duration,
    ) -> Result<Option<Task>, DbError> {
        with_conn(&self.pool, move |c| {
            repo::tasks::lease_next_task(c, &queue_name, &session_id, lease_duration)
        })
        .await
    }

    pub async fn heartbeat_task(
        &self,
        task_id: i64,
        session_id: String,
        lease_duration: Duration,
    ) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| {
            repo::tasks::heartbeat_task(c, task_id, &session_id, lease_duration)
        })
        .await
    }

    pub async fn complete_task(&self, task_id: i64) -> Result<usize, DbError> {
        with_conn(&self.pool, move |c| repo::tasks::complete_task(c, task_id)).await
    }

    pub async fn fail_or_deadletter(
        &self,
        task_id: i64,
        max_retries: i32,
        err: String,
    ) -> Result<bool, DbError> {
        with_conn(&self.pool, move |c| repo::tasks::fail_or_deadletter(c, task_id, max_retries, &err)).await
    }

    pub async fn insert_task_history(&self, new: NewTaskHistory) -> Result<TaskHistory, DbError> {
        with_conn(&self.pool, move |c| repo::tasks::insert_task_history(c, new)).await
    }

    pub async fn list_task_history(&self, task_id: i64) -> Result<Vec<TaskHistory>, DbError> {
        with_conn(&self.pool, move |c| repo::tasks::list_task_history(c, task_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{establish_pool, run_migrations};

    fn test_db() -> PdpDb {
        let url = std::env::var("PDP_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/pdp_test".to_string());
        let pool = establish_pool(&url, 4).unwrap();
        run_migrations(&pool).unwrap();
        PdpDb::new(pool)
    }

    #[ignore = "requires a running postgres instance"]
    #[tokio::test]
    async fn upload_intent_round_trips() {
        let db = test_db();
        let id = Uuid::new_v4();
        let created = db
            .create_upload(NewPdpPieceUpload {
                id,
                service: "test-service".to_string(),
                piece_cid: None,
                notify_url: None,
                check_hash_codec: "sha2-256".to_string(),
                check_hash: "deadbeef".to_string(),
                check_size: 1024,
            })
            .await
            .unwrap();
        assert_eq!(created.id, id);

        let fetched = db.get_upload(id).await.unwrap().unwrap();
        assert_eq!(fetched.check_hash, "deadbeef");

        db.delete_upload(id).await.unwrap();
        assert!(db.get_upload(id).await.unwrap().is_none());
    }

    #[ignore = "requires a running postgres instance"]
    #[tokio::test]
    async fn task_lease_is_exclusive_until_it_expires() {
        let db = test_db();
        let task = db
            .enqueue_task(NewTask { name: "commp".to_string(), payload: b"{}".to_vec() })
            .await
            .unwrap();

        let leased = db
            .lease_next_task("commp".to_string(), "session-a".to_string(), Duration::seconds(30))
            .await
            .unwrap()
            .expect("task should be claimable");
        assert_eq!(leased.id, task.id);

        let second = db
            .lease_next_task("commp".to_string(), "session-b".to_string(), Duration::seconds(30))
            .await
            .unwrap();
        assert!(second.is_none(), "a live lease must not be claimable by another session");

        db.complete_task(task.id).await.unwrap();
    }
}
