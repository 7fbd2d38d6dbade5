//! commP arithmetic: tree-height/padded-size bookkeeping and the
//! stacked-DRG style binary Merkle aggregation used to fold subroot
//! commitments into a single unsealed-sector root.

use sha2::{Digest, Sha256};

/// Largest unpadded piece size accepted on `AllocatePiece`/upload, matching
/// a 32GiB sealed sector's unpadded capacity - the ceiling every in-memory
/// commP merkle tree this service builds is sized against.
pub const MAX_MEMTREE_UNPADDED_SIZE: u64 = 31 * (1u64 << 30);

/// Height of the binary Merkle tree of 32-byte leaves needed to cover
/// `raw_size` bytes: the smallest `h` such that `32 << h >= raw_size`.
pub fn tree_height(raw_size: u64) -> u32 {
    if raw_size <= 32 {
        return 0;
    }
    let leaves = raw_size.div_ceil(32);
    64 - (leaves - 1).leading_zeros()
}

/// `32 << treeHeight(raw_size)`, the padded size a commitment over
/// `raw_size` bytes is defined against.
pub fn padded_size(raw_size: u64) -> u64 {
    32u64 << tree_height(raw_size)
}

/// Truncates a SHA-256 digest to a little-endian field element below
/// `2^254` by clearing the top two bits of its most significant byte, the
/// convention commP commitments share with every Fr32-padded leaf.
fn truncate_to_fr(mut digest: [u8; 32]) -> [u8; 32] {
    digest[31] &= 0x3f;
    digest
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest: [u8; 32] = hasher.finalize().into();
    truncate_to_fr(digest)
}

/// Aggregates a root's subroot commitments into a single unsealed-sector
/// commitment via a binary Merkle tree, zero-padding the leaf list out to
/// a power of two.
///
/// `subroots` is `(commitment, padded_size)` in the order the caller wants
/// them placed in the tree; sizes must already be in descending order
/// (enforced by the caller, per the "descending subroot sizes" invariant).
/// Returns the aggregate commitment and the sum of subroot padded sizes.
pub fn aggregate_subroots(subroots: &[([u8; 32], u64)]) -> ([u8; 32], u64) {
    assert!(!subroots.is_empty(), "aggregate_subroots requires at least one subroot");

    let total_size: u64 = subroots.iter().map(|(_, size)| size).sum();

    let mut level: Vec<[u8; 32]> = subroots.iter().map(|(commitment, _)| *commitment).collect();
    let padded_len = level.len().next_power_of_two();
    level.resize(padded_len, [0u8; 32]);

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    (level[0], total_size)
}

/// Computes a commitment over raw bytes directly: splits into 32-byte
/// leaves (short final leaf zero-padded), zero-pads the leaf count out to
/// a power of two, and folds with the same truncated-SHA-256 pairing
/// [`aggregate_subroots`] uses for subroots. This is the calculator the
/// commP pipeline streams ingest bytes through when no cheaper path (an
/// existing mapping, or an already piece-coded input) applies.
pub fn commitment_of_bytes(data: &[u8]) -> [u8; 32] {
    if data.is_empty() {
        return [0u8; 32];
    }

    let mut leaves: Vec<[u8; 32]> = data
        .chunks(32)
        .map(|chunk| {
            let mut leaf = [0u8; 32];
            leaf[..chunk.len()].copy_from_slice(chunk);
            truncate_to_fr(leaf)
        })
        .collect();

    let padded_len = leaves.len().next_power_of_two();
    leaves.resize(padded_len, [0u8; 32]);

    while leaves.len() > 1 {
        leaves = leaves.chunks(2).map(|pair| hash_pair(&pair[0], &pair[1])).collect();
    }

    leaves[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_height_matches_padded_size_examples() {
        assert_eq!(tree_height(32), 0);
        assert_eq!(padded_size(32), 32);
        assert_eq!(tree_height(33), 1);
        assert_eq!(padded_size(33), 64);
        assert_eq!(padded_size(10240), 32u64 << tree_height(10240));
    }

    #[test]
    fn single_subroot_aggregates_to_itself() {
        let commitment = [5u8; 32];
        let (agg, size) = aggregate_subroots(&[(commitment, 128)]);
        assert_eq!(agg, commitment);
        assert_eq!(size, 128);
    }

    #[test]
    fn aggregation_pads_to_power_of_two_and_is_order_sensitive() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];

        let (agg_abc, size) = aggregate_subroots(&[(a, 64), (b, 32), (c, 16)]);
        let (agg_acb, _) = aggregate_subroots(&[(a, 64), (c, 16), (b, 32)]);

        assert_eq!(size, 112);
        assert_ne!(agg_abc, agg_acb);
    }

    #[test]
    fn aggregate_commitment_is_fr_truncated() {
        let (agg, _) = aggregate_subroots(&[([9u8; 32], 32), ([8u8; 32], 32)]);
        assert_eq!(agg[31] & 0xc0, 0);
    }

    #[test]
    fn commitment_of_bytes_is_deterministic_and_fr_truncated() {
        let data = b"some blob contents to commit to".to_vec();
        let a = commitment_of_bytes(&data);
        let b = commitment_of_bytes(&data);
        assert_eq!(a, b);
        assert_eq!(a[31] & 0xc0, 0);
    }

    #[test]
    fn commitment_of_bytes_differs_for_different_inputs() {
        assert_ne!(commitment_of_bytes(b"a"), commitment_of_bytes(b"b"));
    }

    #[test]
    fn empty_input_commits_to_zero() {
        assert_eq!(commitment_of_bytes(&[]), [0u8; 32]);
    }
}
