use crate::models::*;
use crate::schema::{parked_piece_refs, parked_pieces, pdp_piece_mh_to_commp, pdp_piece_refs};
use diesel::prelude::*;

pub fn insert_parked_piece(
    conn: &mut PgConnection,
    new: NewParkedPiece,
) -> QueryResult<ParkedPiece> {
    diesel::insert_into(parked_pieces::table)
        .values(&new)
        .on_conflict(parked_pieces::piece_cid)
        .do_update()
        .set(parked_pieces::long_term.eq(parked_pieces::long_term))
        .get_result(conn)
}

pub fn mark_piece_complete(conn: &mut PgConnection, piece_id: i64) -> QueryResult<usize> {
    diesel::update(parked_pieces::table.find(piece_id))
        .set(parked_pieces::complete.eq(true))
        .execute(conn)
}

pub fn get_parked_piece_by_cid(
    conn: &mut PgConnection,
    cid: &str,
) -> QueryResult<Option<ParkedPiece>> {
    parked_pieces::table
        .filter(parked_pieces::piece_cid.eq(cid))
        .first(conn)
        .optional()
}

pub fn insert_parked_piece_ref(
    conn: &mut PgConnection,
    new: NewParkedPieceRef,
) -> QueryResult<ParkedPieceRef> {
    diesel::insert_into(parked_piece_refs::table)
        .values(&new)
        .get_result(conn)
}

pub fn insert_pdp_piece_ref(
    conn: &mut PgConnection,
    new: NewPdpPieceRef,
) -> QueryResult<PdpPieceRef> {
    diesel::insert_into(pdp_piece_refs::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_commp_mapping(
    conn: &mut PgConnection,
    mhash: &str,
    size: i64,
) -> QueryResult<Option<PdpPieceMhToCommp>> {
    pdp_piece_mh_to_commp::table
        .filter(pdp_piece_mh_to_commp::mhash.eq(mhash))
        .filter(pdp_piece_mh_to_commp::size.eq(size))
        .first(conn)
        .optional()
}

pub fn insert_commp_mapping(
    conn: &mut PgConnection,
    new: NewPdpPieceMhToCommp,
) -> QueryResult<PdpPieceMhToCommp> {
    diesel::insert_into(pdp_piece_mh_to_commp::table)
        .values(&new)
        .on_conflict((pdp_piece_mh_to_commp::mhash, pdp_piece_mh_to_commp::size))
        .do_update()
        .set(pdp_piece_mh_to_commp::commp.eq(&new.commp))
        .get_result(conn)
}

pub fn get_commp_mapping_by_commp(
    conn: &mut PgConnection,
    commp: &str,
) -> QueryResult<Option<PdpPieceMhToCommp>> {
    pdp_piece_mh_to_commp::table
        .filter(pdp_piece_mh_to_commp::commp.eq(commp))
        .first(conn)
        .optional()
}

/// Every `file://` data URL still referenced by a parked-piece ref, used by
/// the stash's startup orphan sweep.
pub fn list_referenced_data_urls(conn: &mut PgConnection) -> QueryResult<Vec<String>> {
    parked_piece_refs::table
        .select(parked_piece_refs::data_url)
        .load(conn)
}

/// Repoints every `pdp_piece_refs` row scoped to a parked piece (matched by
/// its placeholder CID, the blob digest's own storage key) onto the real
/// commP piece CID once the commP job for that blob has run.
pub fn update_piece_refs_cid_for_parked_piece(
    conn: &mut PgConnection,
    parked_piece_cid: &str,
    new_piece_cid: &str,
) -> QueryResult<usize> {
    let piece = match get_parked_piece_by_cid(conn, parked_piece_cid)? {
        Some(piece) => piece,
        None => return Ok(0),
    };
    let ref_ids: Vec<i64> = parked_piece_refs::table
        .filter(parked_piece_refs::piece_id.eq(piece.id))
        .select(parked_piece_refs::ref_id)
        .load(conn)?;
    diesel::update(pdp_piece_refs::table.filter(pdp_piece_refs::piece_ref.eq_any(ref_ids)))
        .set(pdp_piece_refs::piece_cid.eq(new_piece_cid))
        .execute(conn)
}

/// Joins `pdp_piece_refs -> parked_piece_refs -> parked_pieces` for a set of
/// piece CIDs, the query AddRoots step 3 needs to fetch stored piece info
/// for every subroot in one round trip.
pub fn get_piece_info_for_cids(
    conn: &mut PgConnection,
    service: &str,
    cids: &[String],
) -> QueryResult<Vec<(PdpPieceRef, ParkedPieceRef, ParkedPiece)>> {
    pdp_piece_refs::table
        .inner_join(parked_piece_refs::table.on(pdp_piece_refs::piece_ref.eq(parked_piece_refs::ref_id)))
        .inner_join(parked_pieces::table.on(parked_piece_refs::piece_id.eq(parked_pieces::id)))
        .filter(pdp_piece_refs::service.eq(service))
        .filter(pdp_piece_refs::piece_cid.eq_any(cids))
        .select((
            PdpPieceRef::as_select(),
            ParkedPieceRef::as_select(),
            ParkedPiece::as_select(),
        ))
        .load(conn)
}
