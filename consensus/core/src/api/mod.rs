use std::sync::Arc;

use crate::{
    acceptance_data::AcceptanceData,
    block::{Block, BlockInfo, BlockTemplate},
    blockstatus::BlockStatus,
    coinbase::MinerData,
    errors::{
        block::{BlockProcessResult, RuleError},
        consensus::ConsensusResult,
        pruning::PruningImportResult,
        sync::SyncManagerResult,
        tx::TxResult,
    },
    header::Header,
    sync_info::SyncInfo,
    tx::{MutableTransaction, Transaction},
    ChainPath,
};
use kyanite_hashes::Hash;

/// Abstracts the consensus external API.
///
/// Mutating entries (`build_block_template`, `validate_and_insert_block`,
/// `set_pruning_point_utxo_set`) serialize behind the consensus writer lock;
/// queries take the reader lock.
#[allow(unused_variables)]
pub trait ConsensusApi: Send + Sync {
    fn build_block_template(&self, miner_data: MinerData, txs: Vec<Transaction>) -> Result<BlockTemplate, RuleError> {
        unimplemented!()
    }

    /// Validates the block through the full pipeline and inserts it. Returns
    /// the resulting block status and the virtual selected-parent chain delta.
    fn validate_and_insert_block(&self, block: Block) -> BlockProcessResult<(BlockStatus, ChainPath)> {
        unimplemented!()
    }

    /// Populates the transaction with UTXO entry data from the virtual state
    /// and performs full contextual validation
    fn validate_transaction_and_populate_with_consensus_data(&self, transaction: &mut MutableTransaction) -> TxResult<()> {
        unimplemented!()
    }

    fn get_block(&self, hash: Hash) -> ConsensusResult<Block> {
        unimplemented!()
    }

    fn get_block_info(&self, hash: Hash) -> BlockInfo {
        unimplemented!()
    }

    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        unimplemented!()
    }

    fn get_block_status(&self, hash: Hash) -> Option<BlockStatus> {
        unimplemented!()
    }

    fn get_block_acceptance_data(&self, hash: Hash) -> ConsensusResult<Arc<AcceptanceData>> {
        unimplemented!()
    }

    fn get_virtual_selected_parent(&self) -> Hash {
        unimplemented!()
    }

    fn get_virtual_daa_score(&self) -> u64 {
        unimplemented!()
    }

    fn get_virtual_parents(&self) -> Vec<Hash> {
        unimplemented!()
    }

    fn get_tips(&self) -> Vec<Hash> {
        unimplemented!()
    }

    fn is_ancestor_of(&self, low: Hash, high: Hash) -> ConsensusResult<bool> {
        unimplemented!()
    }

    fn past_median_time(&self, hash: Hash) -> ConsensusResult<u64> {
        unimplemented!()
    }

    /// Returns the hashes in `future(low) ∩ past(high)`, capped at `max_blocks`
    fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> ConsensusResult<(Vec<Hash>, Hash)> {
        unimplemented!()
    }

    /// Returns header-only ancestors of `high` above the pruning point
    fn get_missing_block_body_hashes(&self, high: Hash) -> ConsensusResult<Vec<Hash>> {
        unimplemented!()
    }

    /// Returns exponentially-spaced selected-parent-chain points between
    /// `low` and `high` (defaults: pruning point and headers selected tip)
    fn create_block_locator(&self, low: Option<Hash>, high: Option<Hash>) -> SyncManagerResult<Vec<Hash>> {
        unimplemented!()
    }

    /// Zooms-in on the lowest chain segment the locator brackets
    fn find_next_block_locator_boundaries(&self, locator: &[Hash]) -> SyncManagerResult<(Hash, Hash)> {
        unimplemented!()
    }

    fn pruning_point(&self) -> Hash {
        unimplemented!()
    }

    fn get_pruning_point_utxo_set(&self) -> ConsensusResult<Vec<u8>> {
        unimplemented!()
    }

    fn set_pruning_point_utxo_set(&self, expected_pruning_point: Hash, serialized_utxo_set: &[u8]) -> PruningImportResult<()> {
        unimplemented!()
    }

    fn get_sync_info(&self) -> SyncInfo {
        unimplemented!()
    }
}

pub type DynConsensus = Arc<dyn ConsensusApi>;
