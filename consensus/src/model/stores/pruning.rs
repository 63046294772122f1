use kyanite_database::prelude::{BatchDbWriter, CachedDbItem, StoreError, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

pub trait PruningStoreReader {
    fn pruning_point(&self) -> StoreResult<Hash>;
    /// The next candidate to become a pruning point once it gains enough depth
    fn pruning_point_candidate(&self) -> StoreResult<Hash>;
    /// The pruning point whose UTXO set is currently being imported, if any
    fn importing_pruning_point(&self) -> StoreResult<Option<Hash>>;
}

pub trait PruningStore: PruningStoreReader {
    fn set_batch(&mut self, batch: &mut WriteBatch, pruning_point: Hash, candidate: Hash) -> StoreResult<()>;
    fn set_importing_pruning_point_batch(&mut self, batch: &mut WriteBatch, hash: Option<Hash>) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct DbPruningStore {
    db: Arc<DB>,
    pruning_point: CachedDbItem<Hash>,
    candidate: CachedDbItem<Hash>,
    importing: CachedDbItem<Option<Hash>>,
}

impl DbPruningStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db: Arc::clone(&db),
            pruning_point: CachedDbItem::new(Arc::clone(&db), DatabaseStorePrefixes::PruningPoint.into()),
            candidate: CachedDbItem::new(Arc::clone(&db), DatabaseStorePrefixes::PruningCandidate.into()),
            importing: CachedDbItem::new(db, DatabaseStorePrefixes::ImportingPruningPointUtxoSet.into()),
        }
    }
}

impl PruningStoreReader for DbPruningStore {
    fn pruning_point(&self) -> StoreResult<Hash> {
        self.pruning_point.read()
    }

    fn pruning_point_candidate(&self) -> StoreResult<Hash> {
        self.candidate.read()
    }

    fn importing_pruning_point(&self) -> StoreResult<Option<Hash>> {
        match self.importing.read() {
            Ok(hash) => Ok(hash),
            Err(StoreError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl PruningStore for DbPruningStore {
    fn set_batch(&mut self, batch: &mut WriteBatch, pruning_point: Hash, candidate: Hash) -> StoreResult<()> {
        self.pruning_point.write(BatchDbWriter::new(batch), &pruning_point)?;
        self.candidate.write(BatchDbWriter::new(batch), &candidate)
    }

    fn set_importing_pruning_point_batch(&mut self, batch: &mut WriteBatch, hash: Option<Hash>) -> StoreResult<()> {
        self.importing.write(BatchDbWriter::new(batch), &hash)
    }
}
