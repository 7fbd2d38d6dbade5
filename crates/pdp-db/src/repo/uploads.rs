use crate::models::{NewPdpPieceUpload, PdpPieceUpload};
use crate::schema::pdp_piece_uploads;
use diesel::prelude::*;
use uuid::Uuid;

pub fn create_upload(
    conn: &mut PgConnection,
    new: NewPdpPieceUpload,
) -> QueryResult<PdpPieceUpload> {
    diesel::insert_into(pdp_piece_uploads::table)
        .values(&new)
        .get_result(conn)
}

pub fn get_upload(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<PdpPieceUpload>> {
    pdp_piece_uploads::table.find(id).first(conn).optional()
}

/// Consumes the upload intent once `UploadPiece` lands the bytes.
pub fn delete_upload(conn: &mut PgConnection, id: Uuid) -> QueryResult<usize> {
    diesel::delete(pdp_piece_uploads::table.find(id)).execute(conn)
}
