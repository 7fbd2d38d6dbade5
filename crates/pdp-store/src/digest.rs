//! Multihash-shaped digests used as blobstore keys and as the unit the
//! verifying reader checks incoming bytes against.

use sha2::{Digest as _, Sha256};
use std::fmt;

/// Multihash code for plain `sha2-256`, the usual blob ingest digest.
pub const MH_SHA2_256: u64 = 0x12;

/// A multihash: an algorithm code plus its raw digest bytes. Stored
/// canonically as `<varint code><varint len><digest>` hex, which doubles
/// as the blobstore's on-disk key so two different digest algorithms over
/// the same bytes never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    pub code: u64,
    pub bytes: Vec<u8>,
}

impl Digest {
    pub fn new(code: u64, bytes: Vec<u8>) -> Self {
        Self { code, bytes }
    }

    pub fn sha256_of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self::new(MH_SHA2_256, digest.to_vec())
    }

    /// The canonical multihash encoding: `varint(code) || varint(len) || digest`.
    pub fn to_multihash_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 10);
        out.extend_from_slice(unsigned_varint::encode::u64(
            self.code,
            &mut unsigned_varint::encode::u64_buffer(),
        ));
        out.extend_from_slice(unsigned_varint::encode::usize(
            self.bytes.len(),
            &mut unsigned_varint::encode::usize_buffer(),
        ));
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn from_multihash_bytes(bytes: &[u8]) -> Option<Self> {
        let (code, rest) = unsigned_varint::decode::u64(bytes).ok()?;
        let (len, rest) = unsigned_varint::decode::usize(rest).ok()?;
        if rest.len() < len {
            return None;
        }
        Some(Self::new(code, rest[..len].to_vec()))
    }

    /// The blobstore / stash key derived from this digest: the hex of its
    /// canonical multihash encoding.
    pub fn storage_key(&self) -> String {
        hex::encode(self.to_multihash_bytes())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Incrementally hashes bytes as they're read/written so the verifying
/// reader never has to buffer a whole blob to check its digest.
#[derive(Debug, Clone)]
pub struct Hasher {
    code: u64,
    inner: Sha256,
}

impl Hasher {
    pub fn new(code: u64) -> Self {
        Self { code, inner: Sha256::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(self) -> Digest {
        Digest::new(self.code, self.inner.finalize().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multihash_round_trips() {
        let digest = Digest::sha256_of(b"hello world");
        let bytes = digest.to_multihash_bytes();
        let back = Digest::from_multihash_bytes(&bytes).unwrap();
        assert_eq!(digest, back);
    }

    #[test]
    fn hasher_matches_one_shot_digest() {
        let mut hasher = Hasher::new(MH_SHA2_256);
        hasher.update(b"hello ");
        hasher.update(b"world");
        let incremental = hasher.finalize();
        let one_shot = Digest::sha256_of(b"hello world");
        assert_eq!(incremental, one_shot);
    }
}
