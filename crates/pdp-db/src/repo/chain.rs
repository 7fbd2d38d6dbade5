use crate::models::*;
use crate::schema::{message_waits_eth, pdp_proofset_creates, pdp_provider_registrations};
use diesel::prelude::*;

pub fn insert_message_wait(
    conn: &mut PgConnection,
    new: NewMessageWaitEth,
) -> QueryResult<MessageWaitEth> {
    diesel::insert_into(message_waits_eth::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_message_wait(
    conn: &mut PgConnection,
    tx_hash: &str,
) -> QueryResult<Option<MessageWaitEth>> {
    message_waits_eth::table.find(tx_hash).first(conn).optional()
}

pub fn list_pending_message_waits(conn: &mut PgConnection) -> QueryResult<Vec<MessageWaitEth>> {
    message_waits_eth::table
        .filter(message_waits_eth::tx_status.eq("pending"))
        .load(conn)
}

/// The `pending -> confirmed` transition: irreversible in the logical
/// model, so this never clears `tx_success`/`tx_receipt` once set.
pub fn confirm_message(
    conn: &mut PgConnection,
    tx_hash: &str,
    success: bool,
    receipt: serde_json::Value,
    block_number: i64,
) -> QueryResult<usize> {
    diesel::update(message_waits_eth::table.find(tx_hash))
        .set((
            message_waits_eth::tx_status.eq("confirmed"),
            message_waits_eth::tx_success.eq(success),
            message_waits_eth::tx_receipt.eq(receipt),
            message_waits_eth::confirmed_block_number.eq(block_number),
        ))
        .execute(conn)
}

pub fn insert_proofset_create(
    conn: &mut PgConnection,
    new: NewPdpProofsetCreate,
) -> QueryResult<PdpProofsetCreate> {
    diesel::insert_into(pdp_proofset_creates::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_proofset_create(
    conn: &mut PgConnection,
    tx_hash: &str,
) -> QueryResult<Option<PdpProofsetCreate>> {
    pdp_proofset_creates::table.find(tx_hash).first(conn).optional()
}

pub fn insert_provider_registration(
    conn: &mut PgConnection,
    new: NewPdpProviderRegistration,
) -> QueryResult<PdpProviderRegistration> {
    diesel::insert_into(pdp_provider_registrations::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_provider_registration(
    conn: &mut PgConnection,
    tx_hash: &str,
) -> QueryResult<Option<PdpProviderRegistration>> {
    pdp_provider_registrations::table.find(tx_hash).first(conn).optional()
}

/// The most recent registration this node's address has submitted, used by
/// `GetProviderStatus()` since there's exactly one signer per node and no
/// other handle to "the current one" is tracked in-process.
pub fn get_latest_provider_registration_by_address(
    conn: &mut PgConnection,
    address: &str,
) -> QueryResult<Option<PdpProviderRegistration>> {
    pdp_provider_registrations::table
        .filter(pdp_provider_registrations::address.eq(address))
        .order(pdp_provider_registrations::created_at.desc())
        .first(conn)
        .optional()
}
