use super::genesis::{mainnet_genesis, simnet_genesis, GenesisBlock};
use crate::KType;
use kyanite_math::Uint256;

/// Consensus parameters. Defines the consensus rules a network operates
/// under, hence any change to them is a network split.
#[derive(Clone, Debug)]
pub struct Params {
    pub genesis: GenesisBlock,
    pub ghostdag_k: KType,

    /// Timestamp deviation tolerance expressed in block units. The past
    /// median time window size is `2 * tolerance - 1`.
    pub timestamp_deviation_tolerance: u64,

    /// Target time per block in milliseconds
    pub target_time_per_block: u64,

    /// The maximal allowed offset of a block timestamp above local clock (ms)
    pub max_future_block_time: u64,

    pub max_block_parents: u8,
    pub mergeset_size_limit: u64,
    pub merge_depth: u64,
    pub finality_depth: u64,
    pub pruning_depth: u64,

    pub difficulty_window_size: usize,
    /// Below this window population the difficulty remains at genesis bits
    pub min_difficulty_window_size: usize,
    pub max_difficulty_target: Uint256,

    pub coinbase_payload_script_public_key_max_len: u8,
    pub max_coinbase_payload_len: usize,
    pub coinbase_maturity: u64,

    /// The base block subsidy in sompi; halved every `subsidy_reduction_interval`
    pub base_subsidy: u64,
    /// The halving interval in DAA score units
    pub subsidy_reduction_interval: u64,

    pub max_block_mass: u64,
    pub mass_per_tx_byte: u64,
    pub mass_per_script_pub_key_byte: u64,

    pub skip_proof_of_work: bool,
}

impl Params {
    #[inline]
    #[must_use]
    pub fn past_median_time_window_size(&self) -> usize {
        (2 * self.timestamp_deviation_tolerance - 1) as usize
    }

    #[inline]
    #[must_use]
    pub fn genesis_hash(&self) -> kyanite_hashes::Hash {
        self.genesis.hash()
    }
}

/// The maximal target corresponding to the compact form 0x207fffff
fn max_target() -> Uint256 {
    Uint256::from_u64(0x7fffff) << 232
}

pub fn mainnet_params() -> Params {
    Params {
        genesis: mainnet_genesis(),
        ghostdag_k: 18,
        timestamp_deviation_tolerance: 132,
        target_time_per_block: 1000,
        max_future_block_time: 16_500,
        max_block_parents: 10,
        mergeset_size_limit: 180,
        merge_depth: 3600,
        finality_depth: 86400,
        pruning_depth: 185798,
        difficulty_window_size: 2641,
        min_difficulty_window_size: 2641,
        max_difficulty_target: max_target(),
        coinbase_payload_script_public_key_max_len: 150,
        max_coinbase_payload_len: 204,
        coinbase_maturity: 100,
        base_subsidy: 50_000_000_000,
        subsidy_reduction_interval: 31_536_000,
        max_block_mass: 500_000,
        mass_per_tx_byte: 1,
        mass_per_script_pub_key_byte: 10,
        skip_proof_of_work: false,
    }
}

pub fn simnet_params() -> Params {
    Params {
        genesis: simnet_genesis(),
        ghostdag_k: 10,
        timestamp_deviation_tolerance: 132,
        target_time_per_block: 1000,
        max_future_block_time: 16_500,
        max_block_parents: 10,
        mergeset_size_limit: 180,
        merge_depth: 250,
        finality_depth: 500,
        pruning_depth: 1200,
        difficulty_window_size: 2641,
        min_difficulty_window_size: 2641,
        max_difficulty_target: max_target(),
        coinbase_payload_script_public_key_max_len: 150,
        max_coinbase_payload_len: 204,
        coinbase_maturity: 100,
        base_subsidy: 50_000_000_000,
        subsidy_reduction_interval: 31_536_000,
        max_block_mass: 500_000,
        mass_per_tx_byte: 1,
        mass_per_script_pub_key_byte: 10,
        skip_proof_of_work: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_sizes() {
        let params = simnet_params();
        assert_eq!(params.past_median_time_window_size(), 263);
    }

    #[test]
    fn test_pruning_is_deeper_than_finality() {
        for params in [mainnet_params(), simnet_params()] {
            assert!(params.pruning_depth > params.finality_depth);
            assert!(params.finality_depth > params.merge_depth);
        }
    }
}
