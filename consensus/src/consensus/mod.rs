pub mod services;
pub mod storage;
pub mod test_consensus;

use crate::{
    model::{
        services::reachability::ReachabilityService,
        stores::{
            acceptance_data::AcceptanceDataStoreReader,
            block_transactions::BlockTransactionsStoreReader,
            ghostdag::GhostdagStoreReader,
            headers::HeaderStoreReader,
            headers_selected_tip::HeadersSelectedTipStoreReader,
            pruning::{PruningStore, PruningStoreReader},
            statuses::StatusesStoreReader,
            tips::TipsStoreReader,
            virtual_state::VirtualStateStoreReader,
            DB,
        },
    },
    pipeline::{
        body_processor::BodyProcessor, header_processor::HeaderProcessor, pruning_processor::PruningProcessor,
        virtual_processor::VirtualStateProcessor,
    },
    processes::sync::MAX_HASHES_BETWEEN,
};
use itertools::Itertools;
use kyanite_consensus_core::{
    acceptance_data::AcceptanceData,
    api::ConsensusApi,
    block::{Block, BlockInfo, BlockTemplate},
    blockstatus::BlockStatus::{self, StatusHeaderOnly},
    coinbase::MinerData,
    config::params::Params,
    errors::{
        block::{BlockProcessResult, RuleError},
        consensus::{ConsensusError, ConsensusResult},
        pruning::PruningImportResult,
        sync::SyncManagerResult,
        tx::TxResult,
    },
    header::Header,
    script::ScriptVerifier,
    sync_info::{SyncInfo, SyncState},
    tx::{MutableTransaction, Transaction},
    ChainPath,
};
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;
use log::{info, warn};
use parking_lot::RwLock;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// A single consensus engine instance. All mutating entry points serialize
/// behind the session writer lock and commit their staged store changes
/// atomically; queries take the reader lock (spec §5).
pub struct Consensus {
    // DB
    db: Arc<DB>,

    // Config
    pub params: Params,

    // Storage and services
    pub storage: Arc<storage::ConsensusStorage>,
    pub services: Arc<services::ConsensusServices>,

    // Processors
    pub(crate) header_processor: HeaderProcessor,
    pub(crate) body_processor: BodyProcessor,
    pub(crate) virtual_processor: VirtualStateProcessor,
    pub(crate) pruning_processor: PruningProcessor,

    // The single-writer session lock
    session_lock: RwLock<()>,

    // The block-orchestrator sync state machine
    sync_state: RwLock<SyncState>,
}

impl Consensus {
    pub fn new(db: Arc<DB>, params: Params, script_verifier: Arc<dyn ScriptVerifier>) -> Self {
        let storage = storage::ConsensusStorage::new(db.clone());
        let services = services::ConsensusServices::new(&params, &storage, script_verifier);

        let header_processor = HeaderProcessor::new(&params, db.clone(), storage.clone(), services.clone());
        let body_processor = BodyProcessor::new(&params, db.clone(), storage.clone(), services.clone());
        let virtual_processor = VirtualStateProcessor::new(&params, db.clone(), storage.clone(), services.clone());
        let pruning_processor = PruningProcessor::new(&params, db.clone(), storage.clone(), services.clone());

        let this = Self {
            db,
            params,
            storage,
            services,
            header_processor,
            body_processor,
            virtual_processor,
            pruning_processor,
            session_lock: RwLock::new(()),
            sync_state: RwLock::new(SyncState::Normal),
        };
        this.init();
        this
    }

    /// Bootstraps genesis if the database is fresh
    fn init(&self) {
        if self.storage.virtual_state_store.read().is_initialized() {
            return;
        }
        info!("initializing consensus with genesis {}", self.params.genesis_hash());

        let genesis_header = Arc::new(self.params.genesis.build_header());
        let genesis_block = Block::from_arcs(genesis_header.clone(), Arc::new(vec![self.params.genesis.build_coinbase_transaction()]));

        self.header_processor.process_genesis(genesis_header);
        self.body_processor.process_genesis(&genesis_block);

        let mut batch = WriteBatch::default();
        let mut pruning_write = self.storage.pruning_store.write();
        pruning_write.set_batch(&mut batch, self.params.genesis_hash(), self.params.genesis_hash()).unwrap();
        self.db.write(batch).unwrap();
        drop(pruning_write);

        self.virtual_processor.process_genesis(&self.params.genesis);
    }

    fn virtual_selected_parent(&self) -> Hash {
        self.storage.virtual_state_store.read().get().unwrap().ghostdag_data.selected_parent
    }

    /// The sync-state transition triggered by an incoming block, applied
    /// before any processing (spec §4.7)
    fn apply_pre_insertion_sync_transitions(&self, block: &Block) -> BlockProcessResult<()> {
        let mut state = self.sync_state.write();
        match *state {
            SyncState::Normal => {
                if block.is_header_only() {
                    *state = SyncState::HeadersFirst;
                }
            }
            SyncState::HeadersFirst => {
                if !block.is_header_only() {
                    warn!("received a block with a non-empty body during headers-first sync, returning to normal sync");
                    *state = SyncState::Normal;
                }
            }
            SyncState::MissingUtxoSet => {
                let expected = self.storage.pruning_store.read().importing_pruning_point().unwrap();
                if block.is_header_only() || Some(block.hash()) != expected {
                    return Err(RuleError::UnexpectedBlockInSyncState(block.hash()));
                }
            }
            SyncState::MissingBlockBodies => {}
        }
        Ok(())
    }

    fn validate_and_insert_block_impl(&self, block: Block) -> BlockProcessResult<(BlockStatus, ChainPath)> {
        let hash = block.hash();

        // Idempotent duplicate handling
        match self.storage.statuses_store.read().get(hash).unwrap_option() {
            Some(status) if status.is_invalid() => return Err(RuleError::KnownInvalid),
            Some(status) if status.has_block_body() || block.is_header_only() => {
                debug_assert!(status.has_block_header());
                return Err(RuleError::DuplicateBlock);
            }
            _ => {}
        }

        self.apply_pre_insertion_sync_transitions(&block)?;

        self.header_processor.process_header(block.header.clone())?;

        if block.is_header_only() {
            return Ok((StatusHeaderOnly, ChainPath::default()));
        }

        let status = self.body_processor.process_body(&block)?;

        // During pruning-point import, the matching body completes the
        // MissingUtxoSet stage but cannot be resolved against a UTXO set yet
        {
            let mut state = self.sync_state.write();
            if *state == SyncState::MissingUtxoSet {
                *state = SyncState::MissingBlockBodies;
                return Ok((status, ChainPath::default()));
            }
        }

        let chain_path = self.virtual_processor.resolve_virtual()?;
        self.pruning_processor.advance_pruning_point_if_needed(&self.virtual_processor);

        // Once all bodies up to the virtual selected parent are filled, the
        // body-download stage is complete
        {
            let mut state = self.sync_state.write();
            if *state == SyncState::MissingBlockBodies {
                let headers_tip = self.storage.headers_selected_tip_store.read().get().unwrap().hash;
                let pruning_point = self.storage.pruning_store.read().pruning_point().unwrap();
                if self.services.sync_manager.get_missing_block_body_hashes(headers_tip, pruning_point).is_empty() {
                    *state = SyncState::Normal;
                }
            }
        }

        let final_status = self.storage.statuses_store.read().get(hash).unwrap();
        Ok((final_status, chain_path))
    }

    /// Marks the given pruning point as awaiting a UTXO-set import, moving
    /// the sync state machine into `MissingUtxoSet`. To be called by the
    /// sync collaborator once headers-first reveals a pruning point ahead of
    /// the local one.
    pub fn begin_pruning_point_utxo_set_import(&self, pruning_point: Hash) -> BlockProcessResult<()> {
        let _write_guard = self.session_lock.write();
        let mut batch = WriteBatch::default();
        let mut pruning_write = self.storage.pruning_store.write();
        pruning_write.set_importing_pruning_point_batch(&mut batch, Some(pruning_point)).unwrap();
        self.db.write(batch).unwrap();
        drop(pruning_write);
        *self.sync_state.write() = SyncState::MissingUtxoSet;
        Ok(())
    }
}

impl ConsensusApi for Consensus {
    fn build_block_template(&self, miner_data: MinerData, txs: Vec<Transaction>) -> Result<BlockTemplate, RuleError> {
        let _write_guard = self.session_lock.write();
        self.virtual_processor.build_block_template(miner_data, txs)
    }

    fn validate_and_insert_block(&self, block: Block) -> BlockProcessResult<(BlockStatus, ChainPath)> {
        let _write_guard = self.session_lock.write();
        self.validate_and_insert_block_impl(block)
    }

    fn validate_transaction_and_populate_with_consensus_data(&self, transaction: &mut MutableTransaction) -> TxResult<()> {
        let _read_guard = self.session_lock.read();
        self.virtual_processor.validate_mempool_transaction_and_populate(transaction)
    }

    fn get_block(&self, hash: Hash) -> ConsensusResult<Block> {
        let _read_guard = self.session_lock.read();
        let header = self.storage.headers_store.get_header(hash).map_err(|_| ConsensusError::BlockNotFound(hash))?;
        let transactions = self.storage.block_transactions_store.get(hash).map_err(|_| ConsensusError::BlockNotFound(hash))?;
        Ok(Block::from_arcs(header, transactions))
    }

    fn get_block_info(&self, hash: Hash) -> BlockInfo {
        let _read_guard = self.session_lock.read();
        let Some(status) = self.storage.statuses_store.read().get(hash).unwrap_option() else {
            return BlockInfo::nonexistent();
        };
        let pruning_point = self.storage.pruning_store.read().pruning_point().unwrap();
        let is_in_future_of_pruning_point = status.has_block_header()
            && hash != pruning_point
            && self.services.reachability_service.is_dag_ancestor_of(pruning_point, hash);
        BlockInfo { exists: true, block_status: Some(status), is_in_future_of_pruning_point }
    }

    fn get_header(&self, hash: Hash) -> ConsensusResult<Arc<Header>> {
        let _read_guard = self.session_lock.read();
        self.storage.headers_store.get_header(hash).map_err(|_| ConsensusError::BlockNotFound(hash))
    }

    fn get_block_status(&self, hash: Hash) -> Option<BlockStatus> {
        let _read_guard = self.session_lock.read();
        self.storage.statuses_store.read().get(hash).unwrap_option()
    }

    fn get_block_acceptance_data(&self, hash: Hash) -> ConsensusResult<Arc<AcceptanceData>> {
        let _read_guard = self.session_lock.read();
        self.storage.acceptance_data_store.get(hash).map_err(|_| ConsensusError::BlockNotFound(hash))
    }

    fn get_virtual_selected_parent(&self) -> Hash {
        let _read_guard = self.session_lock.read();
        self.virtual_selected_parent()
    }

    fn get_virtual_daa_score(&self) -> u64 {
        let _read_guard = self.session_lock.read();
        self.storage.virtual_state_store.read().get().unwrap().daa_score
    }

    fn get_virtual_parents(&self) -> Vec<Hash> {
        let _read_guard = self.session_lock.read();
        self.storage.virtual_state_store.read().get().unwrap().parents.clone()
    }

    fn get_tips(&self) -> Vec<Hash> {
        let _read_guard = self.session_lock.read();
        self.storage.tips_store.read().get().unwrap().iter().copied().collect_vec()
    }

    fn is_ancestor_of(&self, low: Hash, high: Hash) -> ConsensusResult<bool> {
        let _read_guard = self.session_lock.read();
        for hash in [low, high] {
            if !self.storage.statuses_store.read().has(hash).unwrap() {
                return Err(ConsensusError::BlockNotFound(hash));
            }
        }
        Ok(self.services.reachability_service.is_dag_ancestor_of(low, high))
    }

    fn past_median_time(&self, hash: Hash) -> ConsensusResult<u64> {
        let _read_guard = self.session_lock.read();
        let ghostdag_data = self.storage.ghostdag_store.get_data(hash).map_err(|_| ConsensusError::BlockNotFound(hash))?;
        let window =
            self.services.dag_traversal_manager.block_window(&ghostdag_data, self.params.past_median_time_window_size());
        Ok(self.services.past_median_time_manager.calc_past_median_time(&ghostdag_data, &window))
    }

    fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> ConsensusResult<(Vec<Hash>, Hash)> {
        let _read_guard = self.session_lock.read();
        for hash in [low, high] {
            if !self.storage.statuses_store.read().has(hash).unwrap() {
                return Err(ConsensusError::BlockNotFound(hash));
            }
        }
        if !self.services.reachability_service.is_dag_ancestor_of(low, high) {
            return Err(ConsensusError::General("expected low to be an ancestor of high"));
        }
        let bounded = max_blocks.clamp(self.params.mergeset_size_limit as usize, MAX_HASHES_BETWEEN);
        Ok(self.services.sync_manager.get_hashes_between(low, high, bounded))
    }

    fn get_missing_block_body_hashes(&self, high: Hash) -> ConsensusResult<Vec<Hash>> {
        let _read_guard = self.session_lock.read();
        if !self.storage.statuses_store.read().has(high).unwrap() {
            return Err(ConsensusError::BlockNotFound(high));
        }
        let pruning_point = self.storage.pruning_store.read().pruning_point().unwrap();
        Ok(self.services.sync_manager.get_missing_block_body_hashes(high, pruning_point))
    }

    fn create_block_locator(&self, low: Option<Hash>, high: Option<Hash>) -> SyncManagerResult<Vec<Hash>> {
        let _read_guard = self.session_lock.read();
        let low = low.unwrap_or_else(|| self.storage.pruning_store.read().pruning_point().unwrap());
        let high = high.unwrap_or_else(|| self.virtual_selected_parent());
        self.services.sync_manager.create_block_locator(low, high)
    }

    fn find_next_block_locator_boundaries(&self, locator: &[Hash]) -> SyncManagerResult<(Hash, Hash)> {
        let _read_guard = self.session_lock.read();
        self.services.sync_manager.find_next_block_locator_boundaries(locator)
    }

    fn pruning_point(&self) -> Hash {
        let _read_guard = self.session_lock.read();
        self.storage.pruning_store.read().pruning_point().unwrap()
    }

    fn get_pruning_point_utxo_set(&self) -> ConsensusResult<Vec<u8>> {
        let _read_guard = self.session_lock.read();
        Ok(self.pruning_processor.get_pruning_point_utxo_set())
    }

    fn set_pruning_point_utxo_set(&self, expected_pruning_point: Hash, serialized_utxo_set: &[u8]) -> PruningImportResult<()> {
        let _write_guard = self.session_lock.write();
        self.pruning_processor.import_pruning_point_utxo_set(expected_pruning_point, serialized_utxo_set)?;
        // The import anchors the virtual at the pruning point; bodies above it are now awaited
        *self.sync_state.write() = SyncState::MissingBlockBodies;
        Ok(())
    }

    fn get_sync_info(&self) -> SyncInfo {
        let _read_guard = self.session_lock.read();
        SyncInfo {
            state: *self.sync_state.read(),
            ibd_root_utxo_block_hash: self.storage.pruning_store.read().importing_pruning_point().unwrap(),
            header_count: self.storage.headers_store.count().unwrap(),
            block_count: self.storage.block_transactions_store.count().unwrap(),
        }
    }
}
