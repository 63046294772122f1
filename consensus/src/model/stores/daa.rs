use kyanite_consensus_core::BlockHashSet;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, StoreError, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Since headers do not carry a DAA score, it is tracked per block here
/// along with the merge-set blocks which fell out of the block's difficulty
/// window (and hence do not contribute to the score nor get rewarded)
#[derive(Clone, Serialize, Deserialize)]
pub struct DaaData {
    pub daa_score: u64,
    pub mergeset_non_daa: Arc<BlockHashSet>,
}

pub trait DaaStoreReader {
    fn get_daa_score(&self, hash: Hash) -> Result<u64, StoreError>;
    fn get_mergeset_non_daa(&self, hash: Hash) -> Result<Arc<BlockHashSet>, StoreError>;
}

pub trait DaaStore: DaaStoreReader {
    fn insert_batch(
        &self,
        batch: &mut WriteBatch,
        hash: Hash,
        daa_score: u64,
        mergeset_non_daa: Arc<BlockHashSet>,
    ) -> Result<(), StoreError>;
    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct DbDaaStore {
    db: Arc<DB>,
    access: CachedDbAccess<Hash, DaaData>,
}

impl DbDaaStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_size, DatabaseStorePrefixes::DaaBlocks.into()) }
    }
}

impl DaaStoreReader for DbDaaStore {
    fn get_daa_score(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.access.read(hash)?.daa_score)
    }

    fn get_mergeset_non_daa(&self, hash: Hash) -> Result<Arc<BlockHashSet>, StoreError> {
        Ok(Arc::clone(&self.access.read(hash)?.mergeset_non_daa))
    }
}

impl DaaStore for DbDaaStore {
    fn insert_batch(
        &self,
        batch: &mut WriteBatch,
        hash: Hash,
        daa_score: u64,
        mergeset_non_daa: Arc<BlockHashSet>,
    ) -> Result<(), StoreError> {
        self.access.write(BatchDbWriter::new(batch), hash, DaaData { daa_score, mergeset_non_daa })
    }

    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError> {
        self.access.delete(BatchDbWriter::new(batch), hash)
    }
}
