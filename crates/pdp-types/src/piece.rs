//! Piece CIDs: the two commP encodings a piece can be addressed by, and the
//! codec dispatch used throughout the resolver and commP pipeline.

use cid::Cid;
use multihash::Multihash;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PdpError;

/// Multihash code for `sha2-256-trunc254-padded` (commP-v1: raw 32-byte commitment).
pub const MH_SHA2_256_TRUNC254_PADDED: u64 = 0x1012;
/// Multihash code for `fr32-sha256-trunc254-padbintree` (commP-v2: commitment + embedded size).
pub const MH_FR32_SHA256_TRUNC254_PADBINTREE: u64 = 0x1011;

/// CID codec for `fil-commitment-unsealed`, used to wrap a v1 multihash.
pub const CODEC_FIL_COMMITMENT_UNSEALED: u64 = 0xf101;
/// CID codec `raw`, used to wrap a v2 multihash (the size travels inside the digest).
pub const CODEC_RAW: u64 = 0x55;

/// Maximum digest size we ever wrap: a v2 multihash is a 32-byte commitment
/// plus a little-endian varint-encoded size, well under 64 bytes in practice.
const MAX_DIGEST_SIZE: usize = 64;

/// The closed set of codecs a multihash handed to the resolver can carry:
/// a piece-v1 commitment, a piece-v2 commitment, or an opaque blob
/// multihash keyed by its digest algorithm name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PieceCodec {
    V1,
    V2,
    Blob(String),
}

impl PieceCodec {
    pub fn from_multihash_code(code: u64) -> Self {
        match code {
            MH_SHA2_256_TRUNC254_PADDED => PieceCodec::V1,
            MH_FR32_SHA256_TRUNC254_PADBINTREE => PieceCodec::V2,
            other => PieceCodec::Blob(format!("0x{other:x}")),
        }
    }
}

/// A piece CID in either of its two encodings, plus whatever a blob
/// multihash resolved from. Wraps `cid::Cid` rather than re-deriving CID
/// binary framing by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceCid(Cid);

impl PieceCid {
    /// Builds a commP-v1 piece CID from a raw 32-byte commitment.
    pub fn v1(commitment: [u8; 32]) -> Result<Self, PdpError> {
        let mh = Multihash::<MAX_DIGEST_SIZE>::wrap(MH_SHA2_256_TRUNC254_PADDED, &commitment)
            .map_err(|e| PdpError::invalid_input(format!("invalid v1 commitment: {e}")))?;
        Ok(Self(Cid::new_v1(CODEC_FIL_COMMITMENT_UNSEALED, mh)))
    }

    /// Builds a commP-v2 piece CID from a raw 32-byte commitment and the
    /// (unpadded) source size the commitment was computed over.
    pub fn v2(commitment: [u8; 32], padded_size: u64) -> Result<Self, PdpError> {
        let mut digest = Vec::with_capacity(32 + 10);
        digest.extend_from_slice(&commitment);
        digest.extend_from_slice(&unsigned_varint::encode::u64(
            padded_size,
            &mut unsigned_varint::encode::u64_buffer(),
        ));
        let mh = Multihash::<MAX_DIGEST_SIZE>::wrap(MH_FR32_SHA256_TRUNC254_PADBINTREE, &digest)
            .map_err(|e| PdpError::invalid_input(format!("invalid v2 commitment: {e}")))?;
        Ok(Self(Cid::new_v1(CODEC_RAW, mh)))
    }

    pub fn codec(&self) -> PieceCodec {
        PieceCodec::from_multihash_code(self.0.hash().code())
    }

    /// The raw 32-byte commitment, regardless of encoding.
    pub fn commitment(&self) -> [u8; 32] {
        let digest = self.0.hash().digest();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..32]);
        out
    }

    /// The embedded padded size, for a v2 CID. `None` for v1, which carries
    /// no size information of its own.
    pub fn padded_size(&self) -> Option<u64> {
        if self.codec() != PieceCodec::V2 {
            return None;
        }
        let digest = self.0.hash().digest();
        unsigned_varint::decode::u64(&digest[32..]).ok().map(|(v, _)| v)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdpError> {
        Cid::try_from(bytes)
            .map(PieceCid)
            .map_err(|e| PdpError::invalid_input(format!("malformed piece CID: {e}")))
    }
}

impl fmt::Display for PieceCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PieceCid {
    type Err = PdpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Cid>()
            .map(PieceCid)
            .map_err(|e| PdpError::invalid_input(format!("malformed piece CID: {e}")))
    }
}

impl Serialize for PieceCid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for PieceCid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_roundtrips_through_bytes() {
        let commitment = [7u8; 32];
        let cid = PieceCid::v1(commitment).unwrap();
        assert_eq!(cid.codec(), PieceCodec::V1);
        assert_eq!(cid.commitment(), commitment);
        assert_eq!(cid.padded_size(), None);

        let bytes = cid.to_bytes();
        let back = PieceCid::from_bytes(&bytes).unwrap();
        assert_eq!(cid, back);
    }

    #[test]
    fn v2_carries_padded_size() {
        let commitment = [9u8; 32];
        let cid = PieceCid::v2(commitment, 2048).unwrap();
        assert_eq!(cid.codec(), PieceCodec::V2);
        assert_eq!(cid.commitment(), commitment);
        assert_eq!(cid.padded_size(), Some(2048));
    }

    #[test]
    fn display_then_parse_is_identity() {
        let cid = PieceCid::v1([1u8; 32]).unwrap();
        let text = cid.to_string();
        let parsed: PieceCid = text.parse().unwrap();
        assert_eq!(cid, parsed);
    }

    #[test]
    fn unknown_multihash_code_is_blob() {
        assert_eq!(
            PieceCodec::from_multihash_code(0x12),
            PieceCodec::Blob("0x12".to_string())
        );
    }
}
