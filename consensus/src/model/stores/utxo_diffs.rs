use kyanite_consensus_core::utxo::utxo_diff::UtxoDiff;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, StoreError, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Store for holding the UTXO difference of a chain block relative to its
/// diff child (the next block on the virtual selected-parent chain; the
/// current virtual selected parent has no diff child and its diff is
/// relative to the virtual UTXO set). Walking diff children from any chain
/// block and applying the collected diffs in reverse to the virtual UTXO
/// set reproduces that block's UTXO state.
///
/// This data exists only for blocks which were candidates to being chain
/// blocks. A block with status `StatusUTXOValid` is expected to have utxo
/// diff data as well as utxo multiset and acceptance data.
pub trait UtxoDiffsStoreReader {
    fn get(&self, hash: Hash) -> Result<Arc<UtxoDiff>, StoreError>;
    fn get_diff_child(&self, hash: Hash) -> Result<Hash, StoreError>;
}

pub trait UtxoDiffsStore: UtxoDiffsStoreReader {
    fn set_diff_and_child_batch(
        &self,
        batch: &mut WriteBatch,
        hash: Hash,
        utxo_diff: Arc<UtxoDiff>,
        diff_child: Hash,
    ) -> Result<(), StoreError>;
    /// Marks `hash` as the diff anchor: its state is restored directly from
    /// the virtual UTXO set and the virtual state's own diff
    fn set_as_anchor_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError>;
    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct DbUtxoDiffsStore {
    db: Arc<DB>,
    diff_access: CachedDbAccess<Hash, Arc<UtxoDiff>>,
    child_access: CachedDbAccess<Hash, Hash>,
}

impl DbUtxoDiffsStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            diff_access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::UtxoDiffs.into()),
            child_access: CachedDbAccess::new(db, cache_size, DatabaseStorePrefixes::UtxoDiffChildren.into()),
        }
    }

    pub fn has_diff_child(&self, hash: Hash) -> Result<bool, StoreError> {
        self.child_access.has(hash)
    }
}

impl UtxoDiffsStoreReader for DbUtxoDiffsStore {
    fn get(&self, hash: Hash) -> Result<Arc<UtxoDiff>, StoreError> {
        self.diff_access.read(hash)
    }

    fn get_diff_child(&self, hash: Hash) -> Result<Hash, StoreError> {
        self.child_access.read(hash)
    }
}

impl UtxoDiffsStore for DbUtxoDiffsStore {
    fn set_diff_and_child_batch(
        &self,
        batch: &mut WriteBatch,
        hash: Hash,
        utxo_diff: Arc<UtxoDiff>,
        diff_child: Hash,
    ) -> Result<(), StoreError> {
        self.diff_access.write(BatchDbWriter::new(batch), hash, utxo_diff)?;
        self.child_access.write(BatchDbWriter::new(batch), hash, diff_child)?;
        Ok(())
    }

    fn set_as_anchor_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError> {
        self.diff_access.delete(BatchDbWriter::new(batch), hash)?;
        self.child_access.delete(BatchDbWriter::new(batch), hash)?;
        Ok(())
    }

    fn delete_batch(&self, batch: &mut WriteBatch, hash: Hash) -> Result<(), StoreError> {
        self.diff_access.delete(BatchDbWriter::new(batch), hash)?;
        self.child_access.delete(BatchDbWriter::new(batch), hash)?;
        Ok(())
    }
}
