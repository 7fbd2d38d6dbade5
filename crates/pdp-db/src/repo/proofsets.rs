use crate::models::*;
use crate::schema::{pdp_proof_sets, pdp_proofset_root_adds, pdp_proofset_roots};
use diesel::prelude::*;

pub fn create_proof_set(
    conn: &mut PgConnection,
    new: NewPdpProofSet,
) -> QueryResult<PdpProofSet> {
    diesel::insert_into(pdp_proof_sets::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_proof_set(conn: &mut PgConnection, id: i64) -> QueryResult<Option<PdpProofSet>> {
    pdp_proof_sets::table.find(id).first(conn).optional()
}

pub fn list_proof_sets(conn: &mut PgConnection, service: &str) -> QueryResult<Vec<PdpProofSet>> {
    pdp_proof_sets::table
        .filter(pdp_proof_sets::service.eq(service))
        .order(pdp_proof_sets::id.asc())
        .load(conn)
}

pub fn set_init_ready(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::update(pdp_proof_sets::table.find(id))
        .set(pdp_proof_sets::init_ready.eq(true))
        .execute(conn)
}

pub fn insert_root_add(
    conn: &mut PgConnection,
    new: NewPdpProofsetRootAdd,
) -> QueryResult<PdpProofsetRootAdd> {
    diesel::insert_into(pdp_proofset_root_adds::table)
        .values(&new)
        .get_result(conn)
}

/// Graduates a confirmed root-add row into the append-only `Root` table,
/// per "confirmed RootAdd rows graduate to Root rows when the transaction
/// confirms".
pub fn graduate_root_add(
    conn: &mut PgConnection,
    root_add: &PdpProofsetRootAdd,
) -> QueryResult<PdpProofsetRoot> {
    diesel::insert_into(pdp_proofset_roots::table)
        .values(NewPdpProofsetRoot {
            proofset_id: root_add.proofset_id,
            root_id: root_add.root_id,
            root_cid: root_add.root_cid.clone(),
            subroot_cid: root_add.subroot_cid.clone(),
            subroot_offset: root_add.subroot_offset,
            subroot_size: root_add.subroot_size,
            piece_ref_id: root_add.piece_ref_id,
        })
        .get_result(conn)
}

pub fn list_roots_for_proofset(
    conn: &mut PgConnection,
    proofset_id: i64,
) -> QueryResult<Vec<PdpProofsetRoot>> {
    pdp_proofset_roots::table
        .filter(pdp_proofset_roots::proofset_id.eq(proofset_id))
        .order((
            pdp_proofset_roots::root_id.asc(),
            pdp_proofset_roots::subroot_offset.asc(),
        ))
        .load(conn)
}

pub fn remove_root(conn: &mut PgConnection, proofset_id: i64, root_id: i64) -> QueryResult<usize> {
    diesel::delete(
        pdp_proofset_roots::table
            .filter(pdp_proofset_roots::proofset_id.eq(proofset_id))
            .filter(pdp_proofset_roots::root_id.eq(root_id)),
    )
    .execute(conn)
}

pub fn delete_proof_set(conn: &mut PgConnection, id: i64) -> QueryResult<usize> {
    diesel::delete(
        pdp_proofset_roots::table.filter(pdp_proofset_roots::proofset_id.eq(id)),
    )
    .execute(conn)?;
    diesel::delete(pdp_proof_sets::table.find(id)).execute(conn)
}
