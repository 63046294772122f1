use kyanite_consensus_core::ChainPath;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, CachedDbItem, StoreError, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// A bidirectional index over the virtual selected-parent chain:
/// index → hash and hash → index, plus the current highest index.
/// Used by block locators and chain queries.
pub trait SelectedChainStoreReader {
    fn get_by_hash(&self, hash: Hash) -> StoreResult<u64>;
    fn get_by_index(&self, index: u64) -> StoreResult<Hash>;
    fn get_tip(&self) -> StoreResult<(u64, Hash)>;
}

pub trait SelectedChainStore: SelectedChainStoreReader {
    /// Applies the chain delta of a virtual update
    fn apply_changes_batch(&mut self, batch: &mut WriteBatch, changes: &ChainPath) -> StoreResult<()>;
    fn init_with_pruning_point_batch(&mut self, batch: &mut WriteBatch, block: Hash) -> StoreResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct IndexKey([u8; 8]);

impl From<u64> for IndexKey {
    fn from(index: u64) -> Self {
        Self(index.to_be_bytes()) // Big-endian for sorted iteration order
    }
}

impl AsRef<[u8]> for IndexKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Clone)]
pub struct DbSelectedChainStore {
    db: Arc<DB>,
    access_hash_by_index: CachedDbAccess<IndexKey, Hash>,
    access_index_by_hash: CachedDbAccess<Hash, u64>,
    highest_index: CachedDbItem<u64>,
}

impl DbSelectedChainStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            access_hash_by_index: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::ChainHashByIndex.into()),
            access_index_by_hash: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::ChainIndexByHash.into()),
            highest_index: CachedDbItem::new(db, DatabaseStorePrefixes::ChainHighestIndex.into()),
        }
    }
}

impl SelectedChainStoreReader for DbSelectedChainStore {
    fn get_by_hash(&self, hash: Hash) -> StoreResult<u64> {
        self.access_index_by_hash.read(hash)
    }

    fn get_by_index(&self, index: u64) -> StoreResult<Hash> {
        self.access_hash_by_index.read(index.into())
    }

    fn get_tip(&self) -> StoreResult<(u64, Hash)> {
        let index = self.highest_index.read()?;
        let hash = self.access_hash_by_index.read(index.into())?;
        Ok((index, hash))
    }
}

impl SelectedChainStore for DbSelectedChainStore {
    fn apply_changes_batch(&mut self, batch: &mut WriteBatch, changes: &ChainPath) -> StoreResult<()> {
        let mut writer = BatchDbWriter::new(batch);
        let mut index = self.highest_index.read()?;
        for removed in changes.removed.iter().copied() {
            let removed_index = self.access_index_by_hash.read(removed)?;
            if removed_index != index {
                return Err(StoreError::DataInconsistency(format!(
                    "expected removed chain block {} to be the current tip",
                    removed
                )));
            }
            self.access_index_by_hash.delete(&mut writer, removed)?;
            self.access_hash_by_index.delete(&mut writer, index.into())?;
            index -= 1;
        }
        for added in changes.added.iter().copied() {
            index += 1;
            self.access_index_by_hash.write(&mut writer, added, index)?;
            self.access_hash_by_index.write(&mut writer, index.into(), added)?;
        }
        self.highest_index.write(&mut writer, &index)?;
        Ok(())
    }

    fn init_with_pruning_point_batch(&mut self, batch: &mut WriteBatch, block: Hash) -> StoreResult<()> {
        let mut writer = BatchDbWriter::new(batch);
        self.access_index_by_hash.write(&mut writer, block, 0)?;
        self.access_hash_by_index.write(&mut writer, 0u64.into(), block)?;
        self.highest_index.write(&mut writer, &0)?;
        Ok(())
    }
}
