use super::Consensus;
use kyanite_consensus_core::{
    api::ConsensusApi,
    block::{Block, MutableBlock},
    blockstatus::BlockStatus,
    coinbase::MinerData,
    config::params::Params,
    errors::block::BlockProcessResult,
    script::PermissiveScriptVerifier,
    tx::{ScriptPublicKey, Transaction},
    ChainPath,
};
use kyanite_database::{create_temp_db, prelude::ConnBuilder, utils::DbLifetime};
use kyanite_hashes::Hash;
use std::{ops::Deref, sync::Arc};

/// A self-contained consensus instance over a temp database, with block
/// building helpers for driving consensus scenarios in tests
pub struct TestConsensus {
    consensus: Arc<Consensus>,
    params: Params,
    _db_lifetime: DbLifetime,
}

impl TestConsensus {
    pub fn new(params: Params) -> Self {
        let (db_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(32));
        let consensus = Arc::new(Consensus::new(db, params.clone(), Arc::new(PermissiveScriptVerifier)));
        Self { consensus, params, _db_lifetime: db_lifetime }
    }

    pub fn consensus(&self) -> Arc<Consensus> {
        self.consensus.clone()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn genesis_hash(&self) -> Hash {
        self.params.genesis_hash()
    }

    /// The miner data used by default for built blocks
    pub fn default_miner_data() -> MinerData {
        MinerData::new(ScriptPublicKey::new(0, vec![1, 2, 3]), Vec::new())
    }

    /// Builds a fully valid block over the given parents with the given transactions
    pub fn build_block_with_parents_and_transactions(&self, parents: Vec<Hash>, txs: Vec<Transaction>) -> MutableBlock {
        self.consensus.virtual_processor.build_block_with_parents(parents, Self::default_miner_data(), txs)
    }

    pub fn build_block_with_parents(&self, parents: Vec<Hash>) -> MutableBlock {
        self.build_block_with_parents_and_transactions(parents, Vec::new())
    }

    /// Builds and inserts an empty block over the given parents, returning its hash
    pub fn add_block_with_parents(&self, parents: Vec<Hash>) -> BlockProcessResult<Hash> {
        let block = self.build_block_with_parents(parents).to_immutable();
        let hash = block.hash();
        self.validate_and_insert_block(block)?;
        Ok(hash)
    }

    pub fn validate_and_insert_block(&self, block: Block) -> BlockProcessResult<(BlockStatus, ChainPath)> {
        self.consensus.validate_and_insert_block(block)
    }
}

impl Deref for TestConsensus {
    type Target = Consensus;

    fn deref(&self) -> &Self::Target {
        &self.consensus
    }
}
