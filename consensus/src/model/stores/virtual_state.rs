use crate::model::stores::ghostdag::GhostdagData;
use kyanite_consensus_core::{
    coinbase::BlockRewardData, config::genesis::GenesisBlock, tx::TransactionId, utxo::utxo_diff::UtxoDiff, BlockHashMap,
    BlockHashSet, HashMapCustomHasher,
};
use kyanite_database::prelude::{BatchDbWriter, CachedDbItem, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use kyanite_muhash::MuHash;
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The state of the virtual block: its parents are the current DAG tips and
/// its GHOSTDAG data is recomputed on every tip change. It owns the live
/// UTXO set (materialized separately in the virtual UTXO set store).
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct VirtualState {
    pub parents: Vec<Hash>,
    pub ghostdag_data: GhostdagData,
    pub daa_score: u64,
    pub bits: u32,
    pub past_median_time: u64,
    pub multiset: MuHash,
    /// The UTXO diff from the selected parent's state to the virtual, i.e.
    /// applying this diff to the selected parent's past UTXO yields the
    /// virtual UTXO set
    pub utxo_diff: UtxoDiff,
    pub accepted_tx_ids: Vec<TransactionId>,
    pub mergeset_rewards: BlockHashMap<BlockRewardData>,
    pub mergeset_non_daa: BlockHashSet,
}

impl VirtualState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parents: Vec<Hash>,
        daa_score: u64,
        bits: u32,
        past_median_time: u64,
        multiset: MuHash,
        utxo_diff: UtxoDiff,
        accepted_tx_ids: Vec<TransactionId>,
        mergeset_rewards: BlockHashMap<BlockRewardData>,
        mergeset_non_daa: BlockHashSet,
        ghostdag_data: GhostdagData,
    ) -> Self {
        Self {
            parents,
            ghostdag_data,
            daa_score,
            bits,
            past_median_time,
            multiset,
            utxo_diff,
            accepted_tx_ids,
            mergeset_rewards,
            mergeset_non_daa,
        }
    }

    pub fn from_genesis(genesis: &GenesisBlock, initial_ghostdag_data: GhostdagData) -> Self {
        let coinbase = genesis.build_coinbase_transaction();
        Self {
            parents: vec![genesis.hash()],
            ghostdag_data: initial_ghostdag_data,
            daa_score: 0,
            bits: genesis.bits,
            past_median_time: genesis.timestamp,
            multiset: MuHash::new(),
            utxo_diff: UtxoDiff::default(), // Virtual diff is initially empty since the genesis coinbase has no outputs
            accepted_tx_ids: vec![coinbase.id()],
            mergeset_rewards: BlockHashMap::new(),
            mergeset_non_daa: BlockHashSet::new(),
        }
    }
}

/// Reader API for `VirtualStateStore`.
pub trait VirtualStateStoreReader {
    fn get(&self) -> StoreResult<Arc<VirtualState>>;
}

pub trait VirtualStateStore: VirtualStateStoreReader {
    fn set_batch(&mut self, batch: &mut WriteBatch, state: Arc<VirtualState>) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct DbVirtualStateStore {
    access: CachedDbItem<Arc<VirtualState>>,
}

impl DbVirtualStateStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, DatabaseStorePrefixes::VirtualState.into()) }
    }

    pub fn is_initialized(&self) -> bool {
        self.access.read().is_ok()
    }
}

impl VirtualStateStoreReader for DbVirtualStateStore {
    fn get(&self) -> StoreResult<Arc<VirtualState>> {
        self.access.read()
    }
}

impl VirtualStateStore for DbVirtualStateStore {
    fn set_batch(&mut self, batch: &mut WriteBatch, state: Arc<VirtualState>) -> StoreResult<()> {
        self.access.write(BatchDbWriter::new(batch), &state)
    }
}
