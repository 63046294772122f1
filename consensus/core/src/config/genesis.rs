use crate::{
    constants::{BLOCK_VERSION, TX_VERSION},
    header::Header,
    merkle::calc_hash_merkle_root,
    subnets::SUBNETWORK_ID_COINBASE,
    tx::Transaction,
};
use kyanite_hashes::Hash;
use kyanite_muhash::empty_muhash;

/// The genesis block definition of a network. The header and coinbase
/// transaction are built programmatically from these constants, so the
/// genesis hash is fully determined by them.
#[derive(Clone, Debug)]
pub struct GenesisBlock {
    pub version: u16,
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
    /// Encoded coinbase payload: blue score (u64), script version (u16),
    /// script length (u8), script, extra data
    pub coinbase_payload: Vec<u8>,
}

impl GenesisBlock {
    pub fn build_coinbase_transaction(&self) -> Transaction {
        Transaction::new(TX_VERSION, Vec::new(), Vec::new(), 0, SUBNETWORK_ID_COINBASE, 0, self.coinbase_payload.clone())
    }

    pub fn build_header(&self) -> Header {
        let coinbase = self.build_coinbase_transaction();
        Header::new(
            self.version,
            Vec::new(), // Genesis is the only block with no parents
            calc_hash_merkle_root(std::iter::once(&coinbase)),
            Hash::default(),
            empty_muhash(), // Genesis commits to an empty UTXO set
            self.timestamp,
            self.bits,
            self.nonce,
        )
    }

    pub fn hash(&self) -> Hash {
        self.build_header().hash
    }
}

fn standard_payload(extra_data: &[u8]) -> Vec<u8> {
    // blue score = 0, empty script public key (version 0, length 0)
    let mut payload = vec![0u8; 11];
    payload.extend_from_slice(extra_data);
    payload
}

pub fn mainnet_genesis() -> GenesisBlock {
    GenesisBlock {
        version: BLOCK_VERSION,
        timestamp: 1700000000000,
        bits: 0x1e7fffff,
        nonce: 0x3392c,
        coinbase_payload: standard_payload(b"kyanite-mainnet"),
    }
}

pub fn simnet_genesis() -> GenesisBlock {
    GenesisBlock {
        version: BLOCK_VERSION,
        timestamp: 1700000000000,
        bits: 0x207fffff,
        nonce: 0x0,
        coinbase_payload: standard_payload(b"kyanite-simnet"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_hash_is_deterministic() {
        assert_eq!(simnet_genesis().hash(), simnet_genesis().hash());
        assert_ne!(simnet_genesis().hash(), mainnet_genesis().hash());
    }

    #[test]
    fn test_genesis_merkle_root_commits_to_coinbase() {
        let genesis = simnet_genesis();
        let header = genesis.build_header();
        let coinbase = genesis.build_coinbase_transaction();
        assert_eq!(header.hash_merkle_root, calc_hash_merkle_root(std::iter::once(&coinbase)));
        assert!(coinbase.is_coinbase());
    }
}
