use crate::tx::ScriptPublicKey;
use serde::{Deserialize, Serialize};

/// The decoded content of a coinbase payload
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CoinbaseData {
    pub blue_score: u64,
    pub miner_data: MinerData,
}

/// The miner-controlled part of the coinbase payload: where rewards for this
/// block should be paid, plus freeform extra data
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MinerData {
    pub script_public_key: ScriptPublicKey,
    pub extra_data: Vec<u8>,
}

impl MinerData {
    pub fn new(script_public_key: ScriptPublicKey, extra_data: Vec<u8>) -> Self {
        Self { script_public_key, extra_data }
    }
}

/// The reward a merged block contributes to the coinbase of its accepting block
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockRewardData {
    pub subsidy: u64,
    pub total_fees: u64,
    pub script_public_key: ScriptPublicKey,
}

impl BlockRewardData {
    pub fn new(subsidy: u64, total_fees: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { subsidy, total_fees, script_public_key }
    }
}
