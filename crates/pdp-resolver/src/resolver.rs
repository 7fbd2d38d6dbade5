//! The piece resolver: a bounded-LRU-fronted view over the
//! append-only blob-multihash <-> piece-multihash mapping table.

use lru::LruCache;
use pdp_db::PdpDb;
use pdp_types::{PdpError, PieceCodec};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// A bounded LRU in front of the table, sized for roughly 100,000 entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub blob_mhash: String,
    pub size: i64,
    pub piece_commp: String,
}

pub struct PieceResolver {
    db: PdpDb,
    // Cache invalidation is never needed (mappings are append-only), so a
    // plain LRU with no TTL is sufficient in both directions.
    by_blob: Mutex<LruCache<(String, i64), String>>,
    by_piece: Mutex<LruCache<String, (String, i64)>>,
}

impl PieceResolver {
    pub fn new(db: PdpDb) -> Self {
        Self::with_capacity(db, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(db: PdpDb, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            db,
            by_blob: Mutex::new(LruCache::new(capacity)),
            by_piece: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// `blob -> piece`. Rejects a piece-coded input (callers use
    /// `resolve_to_blob` for the other direction).
    pub async fn resolve_to_piece(&self, blob_mhash: &str, size: i64) -> Result<Option<String>, PdpError> {
        if let Some(hit) = self.by_blob.lock().unwrap().get(&(blob_mhash.to_string(), size)).cloned() {
            return Ok(Some(hit));
        }
        let Some(row) = self.db.get_commp_mapping(blob_mhash.to_string(), size).await.map_err(PdpError::internal)? else {
            return Ok(None);
        };
        self.by_blob
            .lock()
            .unwrap()
            .put((blob_mhash.to_string(), size), row.commp.clone());
        Ok(Some(row.commp))
    }

    /// `piece -> blob`. Returns `(None, false)`-equivalent as `Ok(None)`
    /// when no mapping row exists.
    pub async fn resolve_to_blob(&self, piece_commp: &str) -> Result<Option<(String, i64)>, PdpError> {
        if let Some(hit) = self.by_piece.lock().unwrap().get(piece_commp).cloned() {
            return Ok(Some(hit));
        }
        let Some(row) = self
            .db
            .get_commp_mapping_by_commp(piece_commp.to_string())
            .await
            .map_err(PdpError::internal)?
        else {
            return Ok(None);
        };
        let result = (row.mhash, row.size);
        self.by_piece.lock().unwrap().put(piece_commp.to_string(), result.clone());
        Ok(Some(result))
    }

    /// Dispatches by codec and applies the appropriate side.
    pub async fn resolve(&self, codec: &PieceCodec, mhash: &str, size: i64) -> Result<ResolveResult, PdpError> {
        match codec {
            PieceCodec::V1 | PieceCodec::V2 => match self.resolve_to_blob(mhash).await? {
                Some((blob, blob_size)) => Ok(ResolveResult::Blob { mhash: blob, size: blob_size }),
                None => Ok(ResolveResult::NotFound),
            },
            PieceCodec::Blob(_) => match self.resolve_to_piece(mhash, size).await? {
                Some(commp) => Ok(ResolveResult::Piece { commp }),
                None => Ok(ResolveResult::NotFound),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    Blob { mhash: String, size: i64 },
    Piece { commp: String },
    NotFound,
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    #[test]
    fn degenerate_capacity_clamps_to_one() {
        assert_eq!(NonZeroUsize::new(0usize.max(1)).unwrap().get(), 1);
        assert_eq!(NonZeroUsize::new(100_000usize.max(1)).unwrap().get(), 100_000);
    }
}
