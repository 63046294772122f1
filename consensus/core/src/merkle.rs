use crate::{hashing, tx::Transaction};
use kyanite_hashes::{Hash, HasherBase, MerkleBranchHash};

/// Computes the merkle root over the given hashes. An empty iterator maps to
/// the zero hash; an odd level duplicates its last node.
pub fn calc_merkle_root(hashes: impl Iterator<Item = Hash>) -> Hash {
    let mut level: Vec<Hash> = hashes.collect();
    if level.is_empty() {
        return Hash::default();
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().expect("level is non-empty"));
        }
        level = level.chunks_exact(2).map(|pair| merkle_hash(pair[0], pair[1])).collect();
    }
    level[0]
}

/// Hashes a left/right pair of tree nodes
pub fn merkle_hash(left: Hash, right: Hash) -> Hash {
    let mut hasher = MerkleBranchHash::new();
    hasher.update(left).update(right);
    hasher.finalize()
}

/// Computes the merkle root over the full transaction hashes of a block body
pub fn calc_hash_merkle_root<'a>(txs: impl Iterator<Item = &'a Transaction>) -> Hash {
    calc_merkle_root(txs.map(hashing::tx::hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_single() {
        assert_eq!(calc_merkle_root(std::iter::empty()), Hash::default());
        let single = Hash::from_u64_word(7);
        assert_eq!(calc_merkle_root(std::iter::once(single)), single);
    }

    #[test]
    fn test_pair_and_odd_levels() {
        let hashes: Vec<Hash> = (1..=3u64).map(Hash::from_u64_word).collect();
        let pair_root = calc_merkle_root(hashes[..2].iter().copied());
        assert_eq!(pair_root, merkle_hash(hashes[0], hashes[1]));

        // Odd level duplicates the last node
        let odd_root = calc_merkle_root(hashes.iter().copied());
        let expected = merkle_hash(merkle_hash(hashes[0], hashes[1]), merkle_hash(hashes[2], hashes[2]));
        assert_eq!(odd_root, expected);
    }

    #[test]
    fn test_order_sensitivity() {
        let a = Hash::from_u64_word(1);
        let b = Hash::from_u64_word(2);
        assert_ne!(calc_merkle_root([a, b].into_iter()), calc_merkle_root([b, a].into_iter()));
    }
}
