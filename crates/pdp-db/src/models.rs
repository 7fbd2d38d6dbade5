//! Queryable/Insertable rows for every table in `schema`, one pair per
//! entity in the data model.

use crate::schema::*;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = parked_pieces)]
pub struct ParkedPiece {
    pub id: i64,
    pub piece_cid: String,
    pub piece_padded_size: i64,
    pub piece_raw_size: i64,
    pub long_term: bool,
    pub complete: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = parked_pieces)]
pub struct NewParkedPiece {
    pub piece_cid: String,
    pub piece_padded_size: i64,
    pub piece_raw_size: i64,
    pub long_term: bool,
    pub complete: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = parked_piece_refs, primary_key(ref_id))]
pub struct ParkedPieceRef {
    pub ref_id: i64,
    pub piece_id: i64,
    pub data_url: String,
    pub long_term: bool,
    pub data_headers: serde_json::Value,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = parked_piece_refs)]
pub struct NewParkedPieceRef {
    pub piece_id: i64,
    pub data_url: String,
    pub long_term: bool,
    pub data_headers: serde_json::Value,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_piece_refs)]
pub struct PdpPieceRef {
    pub id: i64,
    pub service: String,
    pub piece_cid: String,
    pub piece_ref: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_piece_refs)]
pub struct NewPdpPieceRef {
    pub service: String,
    pub piece_cid: String,
    pub piece_ref: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_piece_mh_to_commp, primary_key(mhash, size))]
pub struct PdpPieceMhToCommp {
    pub mhash: String,
    pub size: i64,
    pub commp: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_piece_mh_to_commp)]
pub struct NewPdpPieceMhToCommp {
    pub mhash: String,
    pub size: i64,
    pub commp: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_piece_uploads)]
pub struct PdpPieceUpload {
    pub id: Uuid,
    pub service: String,
    pub piece_cid: Option<String>,
    pub notify_url: Option<String>,
    pub check_hash_codec: String,
    pub check_hash: String,
    pub check_size: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_piece_uploads)]
pub struct NewPdpPieceUpload {
    pub id: Uuid,
    pub service: String,
    pub piece_cid: Option<String>,
    pub notify_url: Option<String>,
    pub check_hash_codec: String,
    pub check_hash: String,
    pub check_size: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, AsChangeset, Serialize)]
#[diesel(table_name = pdp_proof_sets)]
pub struct PdpProofSet {
    pub id: i64,
    pub service: String,
    pub init_ready: bool,
    pub prove_at_epoch: Option<i64>,
    pub prev_challenge_request_epoch: Option<i64>,
    pub proving_period: Option<i64>,
    pub challenge_window: Option<i64>,
    pub challenge_request_msg_hash: Option<String>,
    pub create_message_hash: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_proof_sets)]
pub struct NewPdpProofSet {
    pub service: String,
    pub init_ready: bool,
    pub create_message_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = pdp_proofset_roots)]
pub struct PdpProofsetRoot {
    pub id: i64,
    pub proofset_id: i64,
    pub root_id: i64,
    pub root_cid: String,
    pub subroot_cid: String,
    pub subroot_offset: i64,
    pub subroot_size: i64,
    pub piece_ref_id: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_proofset_roots)]
pub struct NewPdpProofsetRoot {
    pub proofset_id: i64,
    pub root_id: i64,
    pub root_cid: String,
    pub subroot_cid: String,
    pub subroot_offset: i64,
    pub subroot_size: i64,
    pub piece_ref_id: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_proofset_root_adds)]
pub struct PdpProofsetRootAdd {
    pub id: i64,
    pub proofset_id: i64,
    pub root_id: i64,
    pub root_cid: String,
    pub subroot_cid: String,
    pub subroot_offset: i64,
    pub subroot_size: i64,
    pub piece_ref_id: i64,
    pub add_message_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_proofset_root_adds)]
pub struct NewPdpProofsetRootAdd {
    pub proofset_id: i64,
    pub root_id: i64,
    pub root_cid: String,
    pub subroot_cid: String,
    pub subroot_offset: i64,
    pub subroot_size: i64,
    pub piece_ref_id: i64,
    pub add_message_hash: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, AsChangeset)]
#[diesel(table_name = message_waits_eth, primary_key(signed_tx_hash))]
pub struct MessageWaitEth {
    pub signed_tx_hash: String,
    pub tx_status: String,
    pub tx_success: Option<bool>,
    pub tx_receipt: Option<serde_json::Value>,
    pub confirmed_block_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = message_waits_eth)]
pub struct NewMessageWaitEth {
    pub signed_tx_hash: String,
    pub tx_status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_proofset_creates, primary_key(signed_tx_hash))]
pub struct PdpProofsetCreate {
    pub signed_tx_hash: String,
    pub service: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_proofset_creates)]
pub struct NewPdpProofsetCreate {
    pub signed_tx_hash: String,
    pub service: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = pdp_provider_registrations, primary_key(signed_tx_hash))]
pub struct PdpProviderRegistration {
    pub signed_tx_hash: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pdp_provider_registrations)]
pub struct NewPdpProviderRegistration {
    pub signed_tx_hash: String,
    pub address: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, AsChangeset)]
#[diesel(table_name = tasks)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub posted_at: DateTime<Utc>,
    pub initiated_at: Option<DateTime<Utc>>,
    pub leased_by_session: Option<String>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub update_time: DateTime<Utc>,
    pub retries: i32,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask {
    pub name: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = task_history)]
pub struct TaskHistory {
    pub id: i64,
    pub task_id: i64,
    pub name: String,
    pub posted: DateTime<Utc>,
    pub work_start: Option<DateTime<Utc>>,
    pub work_end: Option<DateTime<Utc>>,
    pub result: Option<bool>,
    pub err: Option<String>,
    pub completed_by_session_id: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = task_history)]
pub struct NewTaskHistory {
    pub task_id: i64,
    pub name: String,
    pub posted: DateTime<Utc>,
    pub work_start: Option<DateTime<Utc>>,
    pub work_end: Option<DateTime<Utc>>,
    pub result: Option<bool>,
    pub err: Option<String>,
    pub completed_by_session_id: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = dead_letter_tasks)]
pub struct DeadLetterTask {
    pub id: i64,
    pub name: String,
    pub payload: Vec<u8>,
    pub retries: i32,
    pub last_err: Option<String>,
    pub moved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dead_letter_tasks)]
pub struct NewDeadLetterTask {
    pub id: i64,
    pub name: String,
    pub payload: Vec<u8>,
    pub retries: i32,
    pub last_err: Option<String>,
}
