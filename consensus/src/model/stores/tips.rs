use kyanite_consensus_core::{BlockHashSet, HashMapCustomHasher};
use kyanite_database::prelude::{BatchDbWriter, CachedDbItem, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Reader API for `TipsStore`.
pub trait TipsStoreReader {
    fn get(&self) -> StoreResult<Arc<BlockHashSet>>;
}

pub trait TipsStore: TipsStoreReader {
    /// Adds the new tip and removes its parents from the tips set
    fn add_tip_batch(&mut self, batch: &mut WriteBatch, new_tip: Hash, new_tip_parents: &[Hash]) -> StoreResult<Arc<BlockHashSet>>;
    fn prune_tips_batch(&mut self, batch: &mut WriteBatch, pruned_tips: &[Hash]) -> StoreResult<()>;
    fn init_batch(&mut self, batch: &mut WriteBatch, initial_tips: &[Hash]) -> StoreResult<()>;
}

/// A DB + cache implementation of `TipsStore` trait
#[derive(Clone)]
pub struct DbTipsStore {
    access: CachedDbItem<Arc<BlockHashSet>>,
}

impl DbTipsStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, DatabaseStorePrefixes::Tips.into()) }
    }

    pub fn is_initialized(&self) -> bool {
        self.access.read().is_ok()
    }
}

impl TipsStoreReader for DbTipsStore {
    fn get(&self) -> StoreResult<Arc<BlockHashSet>> {
        self.access.read()
    }
}

impl TipsStore for DbTipsStore {
    fn add_tip_batch(&mut self, batch: &mut WriteBatch, new_tip: Hash, new_tip_parents: &[Hash]) -> StoreResult<Arc<BlockHashSet>> {
        let mut tips = (*self.access.read()?).clone();
        // New tip parents are no longer tips and hence removed
        for parent in new_tip_parents {
            tips.remove(parent);
        }
        tips.insert(new_tip);
        let tips = Arc::new(tips);
        self.access.write(BatchDbWriter::new(batch), &tips)?;
        Ok(tips)
    }

    fn prune_tips_batch(&mut self, batch: &mut WriteBatch, pruned_tips: &[Hash]) -> StoreResult<()> {
        if pruned_tips.is_empty() {
            return Ok(());
        }
        let mut tips = (*self.access.read()?).clone();
        for pruned in pruned_tips {
            tips.remove(pruned);
        }
        self.access.write(BatchDbWriter::new(batch), &Arc::new(tips))?;
        Ok(())
    }

    fn init_batch(&mut self, batch: &mut WriteBatch, initial_tips: &[Hash]) -> StoreResult<()> {
        let tips: BlockHashSet = initial_tips.iter().copied().collect();
        self.access.write(BatchDbWriter::new(batch), &Arc::new(tips))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyanite_database::{create_temp_db, prelude::ConnBuilder};

    #[test]
    fn test_update_tips() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let mut store = DbTipsStore::new(db.clone());
        let mut batch = WriteBatch::default();
        store.init_batch(&mut batch, &[1.into()]).unwrap();
        store.add_tip_batch(&mut batch, 3.into(), &[]).unwrap();
        store.add_tip_batch(&mut batch, 5.into(), &[]).unwrap();
        let tips = store.add_tip_batch(&mut batch, 7.into(), &[3.into(), 5.into()]).unwrap();
        db.write(batch).unwrap();
        assert_eq!(*tips, BlockHashSet::from_iter([1.into(), 7.into()]));

        let mut batch = WriteBatch::default();
        store.prune_tips_batch(&mut batch, &[1.into()]).unwrap();
        db.write(batch).unwrap();
        assert_eq!(*store.get().unwrap(), BlockHashSet::from_iter([7.into()]));
    }
}
