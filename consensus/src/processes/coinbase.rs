use kyanite_consensus_core::{
    coinbase::{BlockRewardData, CoinbaseData, MinerData},
    constants::TX_VERSION,
    errors::coinbase::{CoinbaseError, CoinbaseResult},
    subnets,
    tx::{ScriptPublicKey, Transaction, TransactionOutput},
    BlockHashMap, BlockHashSet,
};

use crate::model::stores::ghostdag::GhostdagData;

const LENGTH_OF_BLUE_SCORE: usize = std::mem::size_of::<u64>();
const LENGTH_OF_SCRIPT_PUB_KEY_VERSION: usize = std::mem::size_of::<u16>();
const LENGTH_OF_SCRIPT_PUB_KEY_LENGTH: usize = std::mem::size_of::<u8>();

const MIN_PAYLOAD_LENGTH: usize = LENGTH_OF_BLUE_SCORE + LENGTH_OF_SCRIPT_PUB_KEY_VERSION + LENGTH_OF_SCRIPT_PUB_KEY_LENGTH;

#[derive(Clone)]
pub struct CoinbaseManager {
    coinbase_payload_script_public_key_max_len: u8,
    max_coinbase_payload_len: usize,
    base_subsidy: u64,
    subsidy_reduction_interval: u64,
}

/// Holds a coinbase transaction along with meta-data obtained during creation
pub struct CoinbaseTransactionTemplate {
    pub tx: Transaction,
}

/// Struct used to streamline payload parsing
struct PayloadParser<'a> {
    rem: &'a [u8], // The unparsed remainder
}

impl<'a> PayloadParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { rem: data }
    }

    /// Returns a slice with the first `n` bytes of `rem`, while setting `rem` to the remaining part
    fn take(&mut self, n: usize) -> &[u8] {
        let (seg, rem) = self.rem.split_at(n);
        self.rem = rem;
        seg
    }
}

impl CoinbaseManager {
    pub fn new(
        coinbase_payload_script_public_key_max_len: u8,
        max_coinbase_payload_len: usize,
        base_subsidy: u64,
        subsidy_reduction_interval: u64,
    ) -> Self {
        Self { coinbase_payload_script_public_key_max_len, max_coinbase_payload_len, base_subsidy, subsidy_reduction_interval }
    }

    /// Builds the unique coinbase transaction expected for the block with the
    /// given GHOSTDAG data: one output per rewarded merge-set blue (paying to
    /// the script its own coinbase payload declared), rewards being subsidy
    /// plus the fees of the transactions the current block accepted from it
    pub fn expected_coinbase_transaction(
        &self,
        miner_data: MinerData,
        ghostdag_data: &GhostdagData,
        mergeset_rewards: &BlockHashMap<BlockRewardData>,
        mergeset_non_daa: &BlockHashSet,
    ) -> CoinbaseResult<CoinbaseTransactionTemplate> {
        let mut outputs = Vec::with_capacity(ghostdag_data.mergeset_blues.len());

        // Add an output for each merge-set blue block (∩ DAA window), paying
        // to the script reported by that block. Note that combinatorially it
        // is nearly impossible for a blue block to be non-DAA.
        for blue in ghostdag_data.mergeset_blues.iter().filter(|h| !mergeset_non_daa.contains(h)) {
            let reward_data = &mergeset_rewards[blue];
            if reward_data.subsidy + reward_data.total_fees > 0 {
                outputs.push(TransactionOutput::new(reward_data.subsidy + reward_data.total_fees, reward_data.script_public_key.clone()));
            }
        }

        // Build the current block's payload
        let payload = self.serialize_coinbase_payload(&CoinbaseData { blue_score: ghostdag_data.blue_score, miner_data })?;

        Ok(CoinbaseTransactionTemplate {
            tx: Transaction::new(TX_VERSION, vec![], outputs, 0, subnets::SUBNETWORK_ID_COINBASE, 0, payload),
        })
    }

    pub fn serialize_coinbase_payload(&self, data: &CoinbaseData) -> CoinbaseResult<Vec<u8>> {
        let script_pub_key_len = data.miner_data.script_public_key.script().len();
        if script_pub_key_len > self.coinbase_payload_script_public_key_max_len as usize {
            return Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(
                script_pub_key_len,
                self.coinbase_payload_script_public_key_max_len,
            ));
        }
        let payload: Vec<u8> = data.blue_score.to_le_bytes().iter().copied()                    // Blue score                   (u64)
            .chain(data.miner_data.script_public_key.version().to_le_bytes().iter().copied())   // Script public key version    (u16)
            .chain((script_pub_key_len as u8).to_le_bytes().iter().copied())                    // Script public key length     (u8)
            .chain(data.miner_data.script_public_key.script().iter().copied())                  // Script public key
            .chain(data.miner_data.extra_data.iter().copied())                                  // Extra data
            .collect();

        Ok(payload)
    }

    pub fn deserialize_coinbase_payload<'a>(&self, payload: &'a [u8]) -> CoinbaseResult<CoinbaseData> {
        if payload.len() < MIN_PAYLOAD_LENGTH {
            return Err(CoinbaseError::PayloadLenBelowMin(payload.len(), MIN_PAYLOAD_LENGTH));
        }

        if payload.len() > self.max_coinbase_payload_len {
            return Err(CoinbaseError::PayloadLenAboveMax(payload.len(), self.max_coinbase_payload_len));
        }

        let mut parser = PayloadParser::new(payload);

        let blue_score = u64::from_le_bytes(parser.take(LENGTH_OF_BLUE_SCORE).try_into().expect("min length was checked"));
        let script_pub_key_version =
            u16::from_le_bytes(parser.take(LENGTH_OF_SCRIPT_PUB_KEY_VERSION).try_into().expect("min length was checked"));
        let script_pub_key_len = u8::from_le_bytes(parser.take(LENGTH_OF_SCRIPT_PUB_KEY_LENGTH).try_into().expect("min length was checked"));

        if script_pub_key_len > self.coinbase_payload_script_public_key_max_len {
            return Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(
                script_pub_key_len as usize,
                self.coinbase_payload_script_public_key_max_len,
            ));
        }

        if parser.rem.len() < script_pub_key_len as usize {
            return Err(CoinbaseError::PayloadCantContainScriptPublicKey(
                payload.len(),
                MIN_PAYLOAD_LENGTH + script_pub_key_len as usize,
            ));
        }

        let script_public_key = ScriptPublicKey::new(script_pub_key_version, parser.take(script_pub_key_len as usize).to_vec());
        let extra_data = parser.rem.to_vec();

        Ok(CoinbaseData { blue_score, miner_data: MinerData { script_public_key, extra_data } })
    }

    /// The block subsidy: the base subsidy halved once per reduction interval
    /// of DAA score, saturating at zero
    pub fn calc_block_subsidy(&self, daa_score: u64) -> u64 {
        let halvings = daa_score / self.subsidy_reduction_interval;
        if halvings >= u64::BITS as u64 {
            return 0;
        }
        self.base_subsidy >> halvings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyanite_consensus_core::config::params::simnet_params;

    fn manager() -> CoinbaseManager {
        let params = simnet_params();
        CoinbaseManager::new(
            params.coinbase_payload_script_public_key_max_len,
            params.max_coinbase_payload_len,
            params.base_subsidy,
            params.subsidy_reduction_interval,
        )
    }

    #[test]
    fn test_subsidy_halving() {
        let params = simnet_params();
        let cbm = manager();

        struct Test {
            name: &'static str,
            daa_score: u64,
            expected: u64,
        }

        let tests = vec![
            Test { name: "start", daa_score: 0, expected: params.base_subsidy },
            Test { name: "before first halving", daa_score: params.subsidy_reduction_interval - 1, expected: params.base_subsidy },
            Test { name: "first halving", daa_score: params.subsidy_reduction_interval, expected: params.base_subsidy / 2 },
            Test { name: "two halvings", daa_score: 2 * params.subsidy_reduction_interval, expected: params.base_subsidy / 4 },
            Test { name: "depleted", daa_score: 100 * params.subsidy_reduction_interval, expected: 0 },
        ];

        for t in tests {
            assert_eq!(cbm.calc_block_subsidy(t.daa_score), t.expected, "test '{}' failed", t.name);
        }
    }

    #[test]
    fn test_payload_serialization() {
        let cbm = manager();

        let script_data = vec![33u8, 255];
        let extra_data = vec![2u8, 3];
        let data = CoinbaseData {
            blue_score: 56,
            miner_data: MinerData { script_public_key: ScriptPublicKey::new(0, script_data), extra_data },
        };

        let payload = cbm.serialize_coinbase_payload(&data).unwrap();
        let deserialized_data = cbm.deserialize_coinbase_payload(&payload).unwrap();

        assert_eq!(data, deserialized_data);

        // Test an actual mainnet-like payload with a 34-byte script
        let script_data = vec![1u8; 34];
        let extra_data = b"kyanite/miner".to_vec();
        let data = CoinbaseData {
            blue_score: 29_000,
            miner_data: MinerData { script_public_key: ScriptPublicKey::new(0, script_data), extra_data },
        };

        let payload = cbm.serialize_coinbase_payload(&data).unwrap();
        let deserialized_data = cbm.deserialize_coinbase_payload(&payload).unwrap();

        assert_eq!(data, deserialized_data);
    }

    #[test]
    fn test_payload_bounds() {
        let cbm = manager();
        let params = simnet_params();

        // Short payloads are rejected
        assert!(matches!(cbm.deserialize_coinbase_payload(&[0u8; MIN_PAYLOAD_LENGTH - 1]), Err(CoinbaseError::PayloadLenBelowMin(_, _))));

        // Over-long payloads are rejected
        let data = CoinbaseData {
            blue_score: 0,
            miner_data: MinerData { script_public_key: Default::default(), extra_data: vec![0; params.max_coinbase_payload_len + 1] },
        };
        let payload = cbm.serialize_coinbase_payload(&data).unwrap();
        assert!(matches!(cbm.deserialize_coinbase_payload(&payload), Err(CoinbaseError::PayloadLenAboveMax(_, _))));

        // A script longer than the allowed max is rejected on serialization
        let data = CoinbaseData {
            blue_score: 0,
            miner_data: MinerData {
                script_public_key: ScriptPublicKey::new(0, vec![0; params.coinbase_payload_script_public_key_max_len as usize + 1]),
                extra_data: vec![],
            },
        };
        assert!(matches!(cbm.serialize_coinbase_payload(&data), Err(CoinbaseError::PayloadScriptPublicKeyLenAboveMax(_, _))));
    }
}
