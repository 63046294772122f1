use crate::hashing;
use borsh::{BorshDeserialize, BorshSerialize};
use kyanite_hashes::Hash;
use serde::{Deserialize, Serialize};

/// A kyanite block header. Parent hashes are required to be sorted in
/// ascending order with no repetition (validated in header-in-isolation).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Header {
    /// Cached header hash. Always use `finalize` after mutating any field.
    pub hash: Hash,
    pub version: u16,
    pub parents: Vec<Hash>,
    pub hash_merkle_root: Hash,
    pub accepted_id_merkle_root: Hash,
    pub utxo_commitment: Hash,
    /// Timestamp is in milliseconds
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
}

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u16,
        parents: Vec<Hash>,
        hash_merkle_root: Hash,
        accepted_id_merkle_root: Hash,
        utxo_commitment: Hash,
        timestamp: u64,
        bits: u32,
        nonce: u64,
    ) -> Self {
        let mut header = Self {
            hash: Default::default(), // Temp init before the finalize below
            version,
            parents,
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            timestamp,
            bits,
            nonce,
        };
        header.finalize();
        header
    }

    /// Finalizes the header and recomputes the header hash
    pub fn finalize(&mut self) {
        self.hash = hashing::header::hash(self);
    }

    pub fn direct_parents(&self) -> &[Hash] {
        &self.parents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_hashing() {
        let mut header = Header::new(1, vec![1.into()], Default::default(), Default::default(), Default::default(), 6, 7, 8);
        let original_hash = header.hash;
        assert_ne!(Hash::default(), original_hash);

        header.bits = 23;
        header.finalize();
        assert_ne!(original_hash, header.hash);
    }
}
