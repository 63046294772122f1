use kyanite_consensus_core::tx::Transaction;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, StoreError, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

pub trait BlockTransactionsStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<Transaction>>, StoreError>;
    fn has(&self, hash: Hash) -> StoreResult<bool>;
    /// The number of block bodies ever committed (not decreased by pruning)
    fn count(&self) -> StoreResult<u64>;
}

pub trait BlockTransactionsStore: BlockTransactionsStoreReader {
    // This is append only
    fn insert_batch(&self, batch: &mut WriteBatch, hash: Hash, transactions: Arc<Vec<Transaction>>) -> Result<(), StoreError>;
    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct DbBlockTransactionsStore {
    db: Arc<DB>,
    access: CachedDbAccess<Hash, Arc<Vec<Transaction>>>,
    count_item: kyanite_database::prelude::CachedDbItem<u64>,
}

impl DbBlockTransactionsStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::BlockTransactions.into()),
            count_item: kyanite_database::prelude::CachedDbItem::new(db, DatabaseStorePrefixes::BodiesCount.into()),
        }
    }
}

impl BlockTransactionsStoreReader for DbBlockTransactionsStore {
    fn get(&self, hash: Hash) -> Result<Arc<Vec<Transaction>>, StoreError> {
        self.access.read(hash)
    }

    fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.access.has(hash)
    }

    fn count(&self) -> StoreResult<u64> {
        match self.count_item.read() {
            Ok(count) => Ok(count),
            Err(StoreError::KeyNotFound(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }
}

impl BlockTransactionsStore for DbBlockTransactionsStore {
    fn insert_batch(&self, batch: &mut WriteBatch, hash: Hash, transactions: Arc<Vec<Transaction>>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(BatchDbWriter::new(batch), hash, transactions)?;
        let count = self.count().unwrap_or_default();
        self.count_item.clone().write(BatchDbWriter::new(batch), &(count + 1))?;
        Ok(())
    }

    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError> {
        self.access.delete(BatchDbWriter::new(batch), hash)
    }
}
