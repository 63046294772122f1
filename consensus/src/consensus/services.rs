use super::storage::ConsensusStorage;
use crate::{
    model::{
        services::{reachability::MTReachabilityService, relations::MTRelationsService},
        stores::{
            depth::DbDepthStore, ghostdag::DbGhostdagStore, headers::DbHeadersStore, reachability::DbReachabilityStore,
            relations::DbRelationsStore, selected_chain::DbSelectedChainStore,
        },
    },
    processes::{
        block_depth::BlockDepthManager, coinbase::CoinbaseManager, difficulty::DifficultyManager, ghostdag::protocol::GhostdagManager,
        mass::MassCalculator, past_median_time::PastMedianTimeManager, pruning::PruningManager, sync::SyncManager,
        transaction_validator::TransactionValidator, traversal_manager::DagTraversalManager,
    },
};
use kyanite_consensus_core::{config::params::Params, script::ScriptVerifier};
use std::sync::Arc;

pub type DbGhostdagManager =
    GhostdagManager<DbGhostdagStore, MTRelationsService<DbRelationsStore>, MTReachabilityService<DbReachabilityStore>, DbHeadersStore>;
pub type DbDagTraversalManager = DagTraversalManager<DbGhostdagStore, DbReachabilityStore, MTRelationsService<DbRelationsStore>>;
pub type DbDifficultyManager = DifficultyManager<DbHeadersStore>;
pub type DbPastMedianTimeManager = PastMedianTimeManager<DbHeadersStore>;
pub type DbBlockDepthManager = BlockDepthManager<DbDepthStore, DbReachabilityStore, DbGhostdagStore>;
pub type DbPruningManager = PruningManager<DbGhostdagStore, DbReachabilityStore>;
pub type DbSyncManager = SyncManager<DbReachabilityStore, DbGhostdagStore, DbSelectedChainStore>;

/// The manager and service collection of a consensus instance
pub struct ConsensusServices {
    pub reachability_service: MTReachabilityService<DbReachabilityStore>,
    pub relations_service: MTRelationsService<DbRelationsStore>,
    pub ghostdag_manager: DbGhostdagManager,
    pub dag_traversal_manager: DbDagTraversalManager,
    pub difficulty_manager: DbDifficultyManager,
    pub past_median_time_manager: DbPastMedianTimeManager,
    pub depth_manager: DbBlockDepthManager,
    pub pruning_manager: DbPruningManager,
    pub sync_manager: DbSyncManager,
    pub coinbase_manager: CoinbaseManager,
    pub mass_calculator: MassCalculator,
    pub transaction_validator: TransactionValidator,
}

impl ConsensusServices {
    pub fn new(params: &Params, storage: &Arc<ConsensusStorage>, script_verifier: Arc<dyn ScriptVerifier>) -> Arc<Self> {
        let reachability_service = MTReachabilityService::new(storage.reachability_store.clone());
        let relations_service = MTRelationsService::new(storage.relations_store.clone());

        let ghostdag_manager = GhostdagManager::new(
            params.genesis_hash(),
            params.ghostdag_k,
            storage.ghostdag_store.clone(),
            relations_service.clone(),
            storage.headers_store.clone(),
            reachability_service.clone(),
        );

        let dag_traversal_manager = DagTraversalManager::new(
            params.genesis_hash(),
            storage.ghostdag_store.clone(),
            relations_service.clone(),
            reachability_service.clone(),
        );

        let difficulty_manager = DifficultyManager::new(
            storage.headers_store.clone(),
            params.genesis.bits,
            params.max_difficulty_target,
            params.difficulty_window_size,
            params.min_difficulty_window_size,
            params.target_time_per_block,
        );

        let past_median_time_manager = PastMedianTimeManager::new(storage.headers_store.clone(), params.genesis.timestamp);

        let depth_manager = BlockDepthManager::new(
            params.merge_depth,
            params.finality_depth,
            params.genesis_hash(),
            storage.depth_store.clone(),
            reachability_service.clone(),
            storage.ghostdag_store.clone(),
        );

        let pruning_manager = PruningManager::new(
            params.pruning_depth,
            params.finality_depth,
            params.genesis_hash(),
            reachability_service.clone(),
            storage.ghostdag_store.clone(),
        );

        let sync_manager = SyncManager::new(
            params.mergeset_size_limit as usize,
            reachability_service.clone(),
            storage.ghostdag_store.clone(),
            storage.selected_chain_store.clone(),
            storage.statuses_store.clone(),
        );

        let coinbase_manager = CoinbaseManager::new(
            params.coinbase_payload_script_public_key_max_len,
            params.max_coinbase_payload_len,
            params.base_subsidy,
            params.subsidy_reduction_interval,
        );

        let mass_calculator = MassCalculator::new(params.mass_per_tx_byte, params.mass_per_script_pub_key_byte);

        let transaction_validator =
            TransactionValidator::new(params.coinbase_maturity, params.max_block_mass, mass_calculator.clone(), script_verifier);

        Arc::new(Self {
            reachability_service,
            relations_service,
            ghostdag_manager,
            dag_traversal_manager,
            difficulty_manager,
            past_median_time_manager,
            depth_manager,
            pruning_manager,
            sync_manager,
            coinbase_manager,
            mass_calculator,
            transaction_validator,
        })
    }
}
