use kyanite_consensus_core::acceptance_data::AcceptanceData;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, StoreError, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

pub trait AcceptanceDataStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<AcceptanceData>, StoreError>;
}

pub trait AcceptanceDataStore: AcceptanceDataStoreReader {
    fn insert_batch(&self, batch: &mut WriteBatch, hash: Hash, acceptance_data: Arc<AcceptanceData>) -> Result<(), StoreError>;
    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct DbAcceptanceDataStore {
    db: Arc<DB>,
    access: CachedDbAccess<Hash, Arc<AcceptanceData>>,
}

impl DbAcceptanceDataStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_size, DatabaseStorePrefixes::AcceptanceData.into()) }
    }
}

impl AcceptanceDataStoreReader for DbAcceptanceDataStore {
    fn get(&self, hash: Hash) -> Result<Arc<AcceptanceData>, StoreError> {
        self.access.read(hash)
    }
}

impl AcceptanceDataStore for DbAcceptanceDataStore {
    fn insert_batch(&self, batch: &mut WriteBatch, hash: Hash, acceptance_data: Arc<AcceptanceData>) -> Result<(), StoreError> {
        self.access.write(BatchDbWriter::new(batch), hash, acceptance_data)
    }

    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError> {
        self.access.delete(BatchDbWriter::new(batch), hash)
    }
}
