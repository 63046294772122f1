use crate::constants::perf;
use crate::model::stores::{
    acceptance_data::DbAcceptanceDataStore, block_transactions::DbBlockTransactionsStore, daa::DbDaaStore, depth::DbDepthStore,
    ghostdag::DbGhostdagStore, headers::DbHeadersStore, headers_selected_tip::DbHeadersSelectedTipStore, pruning::DbPruningStore,
    reachability::DbReachabilityStore, relations::DbRelationsStore, selected_chain::DbSelectedChainStore, statuses::DbStatusesStore,
    tips::DbTipsStore, utxo_diffs::DbUtxoDiffsStore, utxo_multisets::DbUtxoMultisetsStore, utxo_set::DbUtxoSetStore,
    virtual_state::DbVirtualStateStore, DB,
};
use kyanite_database::registry::DatabaseStorePrefixes;
use parking_lot::RwLock;
use std::sync::Arc;

/// The complete store collection of a consensus instance. Stores requiring
/// mutation are behind read-write locks; append-only stores are shared as-is.
pub struct ConsensusStorage {
    pub db: Arc<DB>,

    pub statuses_store: Arc<RwLock<DbStatusesStore>>,
    pub relations_store: Arc<RwLock<DbRelationsStore>>,
    pub reachability_store: Arc<RwLock<DbReachabilityStore>>,
    pub ghostdag_store: Arc<DbGhostdagStore>,
    pub headers_store: Arc<DbHeadersStore>,
    pub block_transactions_store: Arc<DbBlockTransactionsStore>,
    pub daa_store: Arc<DbDaaStore>,
    pub depth_store: Arc<DbDepthStore>,
    pub tips_store: Arc<RwLock<DbTipsStore>>,
    pub headers_selected_tip_store: Arc<RwLock<DbHeadersSelectedTipStore>>,
    pub selected_chain_store: Arc<RwLock<DbSelectedChainStore>>,

    // UTXO-related stores
    pub utxo_diffs_store: Arc<DbUtxoDiffsStore>,
    pub utxo_multisets_store: Arc<DbUtxoMultisetsStore>,
    pub acceptance_data_store: Arc<DbAcceptanceDataStore>,
    pub virtual_utxo_store: Arc<RwLock<DbUtxoSetStore>>,
    pub virtual_state_store: Arc<RwLock<DbVirtualStateStore>>,

    // Pruning-related stores
    pub pruning_store: Arc<RwLock<DbPruningStore>>,
    pub pruning_utxo_store: Arc<RwLock<DbUtxoSetStore>>,
}

impl ConsensusStorage {
    pub fn new(db: Arc<DB>) -> Arc<Self> {
        Arc::new(Self {
            db: db.clone(),
            statuses_store: Arc::new(RwLock::new(DbStatusesStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE))),
            relations_store: Arc::new(RwLock::new(DbRelationsStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE))),
            reachability_store: Arc::new(RwLock::new(DbReachabilityStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE))),
            ghostdag_store: Arc::new(DbGhostdagStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE)),
            headers_store: Arc::new(DbHeadersStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE)),
            block_transactions_store: Arc::new(DbBlockTransactionsStore::new(db.clone(), perf::LARGE_DATA_CACHE_SIZE)),
            daa_store: Arc::new(DbDaaStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE)),
            depth_store: Arc::new(DbDepthStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE)),
            tips_store: Arc::new(RwLock::new(DbTipsStore::new(db.clone()))),
            headers_selected_tip_store: Arc::new(RwLock::new(DbHeadersSelectedTipStore::new(db.clone()))),
            selected_chain_store: Arc::new(RwLock::new(DbSelectedChainStore::new(db.clone(), perf::DEFAULT_CACHE_SIZE))),
            utxo_diffs_store: Arc::new(DbUtxoDiffsStore::new(db.clone(), perf::LARGE_DATA_CACHE_SIZE)),
            utxo_multisets_store: Arc::new(DbUtxoMultisetsStore::new(db.clone(), perf::LARGE_DATA_CACHE_SIZE)),
            acceptance_data_store: Arc::new(DbAcceptanceDataStore::new(db.clone(), perf::LARGE_DATA_CACHE_SIZE)),
            virtual_utxo_store: Arc::new(RwLock::new(DbUtxoSetStore::new(
                db.clone(),
                perf::UTXO_CACHE_SIZE,
                DatabaseStorePrefixes::VirtualUtxoSet.into(),
            ))),
            virtual_state_store: Arc::new(RwLock::new(DbVirtualStateStore::new(db.clone()))),
            pruning_store: Arc::new(RwLock::new(DbPruningStore::new(db.clone()))),
            pruning_utxo_store: Arc::new(RwLock::new(DbUtxoSetStore::new(
                db,
                perf::UTXO_CACHE_SIZE,
                DatabaseStorePrefixes::PruningUtxoSet.into(),
            ))),
        })
    }
}
