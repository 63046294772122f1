use kyanite_consensus_core::{blockhash::BlockHashes, BlockHashMap, BlockHashSet, HashMapCustomHasher};
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, CachedDbItem, DbKey, StoreError, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use parking_lot::{RwLockUpgradableReadGuard, RwLockWriteGuard};
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::{collections::hash_map::Entry::Vacant, sync::Arc};

use crate::processes::reachability::interval::Interval;

#[derive(Clone, Serialize, Deserialize)]
pub struct ReachabilityData {
    pub children: BlockHashes,
    pub parent: Hash,
    pub interval: Interval,
    pub height: u64,
    pub future_covering_set: BlockHashes,
}

impl ReachabilityData {
    pub fn new(parent: Hash, interval: Interval, height: u64) -> Self {
        Self { children: Arc::new(vec![]), parent, interval, height, future_covering_set: Arc::new(vec![]) }
    }
}

pub trait ReachabilityStoreReader {
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
    fn get_interval(&self, hash: Hash) -> Result<Interval, StoreError>;
    fn get_parent(&self, hash: Hash) -> Result<Hash, StoreError>;
    fn get_height(&self, hash: Hash) -> Result<u64, StoreError>;
    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn get_future_covering_set(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
}

pub trait ReachabilityStore: ReachabilityStoreReader {
    fn init(&mut self, origin: Hash, capacity: Interval) -> Result<(), StoreError>;
    fn insert(&mut self, hash: Hash, parent: Hash, interval: Interval, height: u64) -> Result<(), StoreError>;
    fn set_interval(&mut self, hash: Hash, interval: Interval) -> Result<(), StoreError>;
    fn set_parent(&mut self, hash: Hash, new_parent: Hash) -> Result<(), StoreError>;
    fn append_child(&mut self, hash: Hash, child: Hash) -> Result<u64, StoreError>;
    /// Replaces `replaced` within the children list of `hash` with the (ordered) blocks of `replace_with`
    fn replace_child(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError>;
    fn insert_future_covering_item(&mut self, hash: Hash, fci: Hash, insertion_index: usize) -> Result<(), StoreError>;
    /// Replaces `replaced` within the future covering set of `hash` with the (ordered) blocks of `replace_with`
    fn replace_future_covering_item(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError>;
    fn delete(&mut self, hash: Hash) -> Result<(), StoreError>;
    fn set_reindex_root(&mut self, root: Hash) -> Result<(), StoreError>;
    fn get_reindex_root(&self) -> Result<Hash, StoreError>;
}

fn replace_in_list(list: &mut Vec<Hash>, replaced: Hash, replace_with: &[Hash]) {
    if let Some(index) = list.iter().position(|&h| h == replaced) {
        list.splice(index..index + 1, replace_with.iter().copied());
    }
}

/// A DB + cache implementation of `ReachabilityStore` trait, with concurrent readers support.
#[derive(Clone)]
pub struct DbReachabilityStore {
    db: Arc<DB>,
    access: CachedDbAccess<Hash, Arc<ReachabilityData>>,
    reindex_root: CachedDbItem<Hash>,
}

impl DbReachabilityStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::Reachability.into()),
            reindex_root: CachedDbItem::new(db, DatabaseStorePrefixes::ReachabilityReindexRoot.into()),
        }
    }

    fn update_data<F>(&mut self, hash: Hash, op: F) -> Result<Arc<ReachabilityData>, StoreError>
    where
        F: FnOnce(&mut ReachabilityData),
    {
        let mut data = self.access.read(hash)?;
        op(Arc::make_mut(&mut data));
        self.access.write(kyanite_database::prelude::DirectDbWriter::new(&self.db), hash, data.clone())?;
        Ok(data)
    }
}

impl ReachabilityStore for DbReachabilityStore {
    fn init(&mut self, origin: Hash, capacity: Interval) -> Result<(), StoreError> {
        debug_assert!(!self.has(origin)?);
        self.insert(origin, Hash::default(), capacity, 0)?;
        self.set_reindex_root(origin)?;
        Ok(())
    }

    fn insert(&mut self, hash: Hash, parent: Hash, interval: Interval, height: u64) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::KeyAlreadyExists(hash.to_string()));
        }
        let data = Arc::new(ReachabilityData::new(parent, interval, height));
        self.access.write(kyanite_database::prelude::DirectDbWriter::new(&self.db), hash, data)?;
        Ok(())
    }

    fn set_interval(&mut self, hash: Hash, interval: Interval) -> Result<(), StoreError> {
        self.update_data(hash, |data| data.interval = interval)?;
        Ok(())
    }

    fn set_parent(&mut self, hash: Hash, new_parent: Hash) -> Result<(), StoreError> {
        self.update_data(hash, |data| data.parent = new_parent)?;
        Ok(())
    }

    fn append_child(&mut self, hash: Hash, child: Hash) -> Result<u64, StoreError> {
        let data = self.update_data(hash, |data| Arc::make_mut(&mut data.children).push(child))?;
        Ok(data.height)
    }

    fn replace_child(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        self.update_data(hash, |data| replace_in_list(Arc::make_mut(&mut data.children), replaced, replace_with))?;
        Ok(())
    }

    fn insert_future_covering_item(&mut self, hash: Hash, fci: Hash, insertion_index: usize) -> Result<(), StoreError> {
        self.update_data(hash, |data| Arc::make_mut(&mut data.future_covering_set).insert(insertion_index, fci))?;
        Ok(())
    }

    fn replace_future_covering_item(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        self.update_data(hash, |data| replace_in_list(Arc::make_mut(&mut data.future_covering_set), replaced, replace_with))?;
        Ok(())
    }

    fn delete(&mut self, hash: Hash) -> Result<(), StoreError> {
        self.access.delete(kyanite_database::prelude::DirectDbWriter::new(&self.db), hash)
    }

    fn set_reindex_root(&mut self, root: Hash) -> Result<(), StoreError> {
        self.reindex_root.write(kyanite_database::prelude::DirectDbWriter::new(&self.db), &root)
    }

    fn get_reindex_root(&self) -> Result<Hash, StoreError> {
        self.reindex_root.read()
    }
}

impl ReachabilityStoreReader for DbReachabilityStore {
    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.access.has(hash)
    }

    fn get_interval(&self, hash: Hash) -> Result<Interval, StoreError> {
        Ok(self.access.read(hash)?.interval)
    }

    fn get_parent(&self, hash: Hash) -> Result<Hash, StoreError> {
        Ok(self.access.read(hash)?.parent)
    }

    fn get_height(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.access.read(hash)?.height)
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.access.read(hash)?.children))
    }

    fn get_future_covering_set(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(BlockHashes::clone(&self.access.read(hash)?.future_covering_set))
    }
}

/// A staging wrapper over `DbReachabilityStore`: all mutations accumulate
/// in memory and are pushed into a single `WriteBatch` on commit, keeping
/// interval/reindex updates atomic with the rest of the header commit.
pub struct StagingReachabilityStore<'a> {
    store_read: RwLockUpgradableReadGuard<'a, DbReachabilityStore>,
    staging_writes: BlockHashMap<ReachabilityData>,
    staging_deletions: BlockHashSet,
    staging_reindex_root: Option<Hash>,
}

impl<'a> StagingReachabilityStore<'a> {
    pub fn new(store_read: RwLockUpgradableReadGuard<'a, DbReachabilityStore>) -> Self {
        Self {
            store_read,
            staging_writes: BlockHashMap::new(),
            staging_deletions: BlockHashSet::new(),
            staging_reindex_root: None,
        }
    }

    pub fn commit(self, batch: &mut WriteBatch) -> Result<RwLockWriteGuard<'a, DbReachabilityStore>, StoreError> {
        let mut store_write = RwLockUpgradableReadGuard::upgrade(self.store_read);
        for (k, v) in self.staging_writes {
            store_write.access.write(BatchDbWriter::new(batch), k, Arc::new(v))?
        }
        // Deletions always come after mutations
        store_write.access.delete_many(BatchDbWriter::new(batch), &mut self.staging_deletions.iter().copied())?;
        if let Some(root) = self.staging_reindex_root {
            store_write.reindex_root.write(BatchDbWriter::new(batch), &root)?;
        }
        Ok(store_write)
    }

    fn read_for_update(&mut self, hash: Hash) -> Result<&mut ReachabilityData, StoreError> {
        self.check_not_deleted(hash)?;
        if let Vacant(e) = self.staging_writes.entry(hash) {
            let data = (*self.store_read.access.read(hash)?).clone();
            e.insert(data);
        }
        Ok(self.staging_writes.get_mut(&hash).expect("was just inserted if missing"))
    }

    fn check_not_deleted(&self, hash: Hash) -> Result<(), StoreError> {
        if self.staging_deletions.contains(&hash) {
            Err(StoreError::KeyNotFound(DbKey::new(b"staging-reachability", hash)))
        } else {
            Ok(())
        }
    }
}

impl ReachabilityStore for StagingReachabilityStore<'_> {
    fn init(&mut self, origin: Hash, capacity: Interval) -> Result<(), StoreError> {
        self.insert(origin, Hash::default(), capacity, 0)?;
        self.set_reindex_root(origin)?;
        Ok(())
    }

    fn insert(&mut self, hash: Hash, parent: Hash, interval: Interval, height: u64) -> Result<(), StoreError> {
        let was_staged_for_deletion = self.staging_deletions.remove(&hash);
        if !was_staged_for_deletion && self.store_read.has(hash)? {
            return Err(StoreError::KeyAlreadyExists(hash.to_string()));
        }
        if let Vacant(e) = self.staging_writes.entry(hash) {
            e.insert(ReachabilityData::new(parent, interval, height));
            Ok(())
        } else {
            Err(StoreError::KeyAlreadyExists(hash.to_string()))
        }
    }

    fn set_interval(&mut self, hash: Hash, interval: Interval) -> Result<(), StoreError> {
        self.read_for_update(hash)?.interval = interval;
        Ok(())
    }

    fn set_parent(&mut self, hash: Hash, new_parent: Hash) -> Result<(), StoreError> {
        self.read_for_update(hash)?.parent = new_parent;
        Ok(())
    }

    fn append_child(&mut self, hash: Hash, child: Hash) -> Result<u64, StoreError> {
        let data = self.read_for_update(hash)?;
        Arc::make_mut(&mut data.children).push(child);
        Ok(data.height)
    }

    fn replace_child(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        let data = self.read_for_update(hash)?;
        replace_in_list(Arc::make_mut(&mut data.children), replaced, replace_with);
        Ok(())
    }

    fn insert_future_covering_item(&mut self, hash: Hash, fci: Hash, insertion_index: usize) -> Result<(), StoreError> {
        let data = self.read_for_update(hash)?;
        Arc::make_mut(&mut data.future_covering_set).insert(insertion_index, fci);
        Ok(())
    }

    fn replace_future_covering_item(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        let data = self.read_for_update(hash)?;
        replace_in_list(Arc::make_mut(&mut data.future_covering_set), replaced, replace_with);
        Ok(())
    }

    fn delete(&mut self, hash: Hash) -> Result<(), StoreError> {
        self.staging_writes.remove(&hash);
        self.staging_deletions.insert(hash);
        Ok(())
    }

    fn set_reindex_root(&mut self, root: Hash) -> Result<(), StoreError> {
        self.staging_reindex_root = Some(root);
        Ok(())
    }

    fn get_reindex_root(&self) -> Result<Hash, StoreError> {
        if let Some(root) = self.staging_reindex_root {
            Ok(root)
        } else {
            self.store_read.get_reindex_root()
        }
    }
}

impl ReachabilityStoreReader for StagingReachabilityStore<'_> {
    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        if self.staging_deletions.contains(&hash) {
            return Ok(false);
        }
        Ok(self.staging_writes.contains_key(&hash) || self.store_read.has(hash)?)
    }

    fn get_interval(&self, hash: Hash) -> Result<Interval, StoreError> {
        self.check_not_deleted(hash)?;
        if let Some(data) = self.staging_writes.get(&hash) {
            Ok(data.interval)
        } else {
            Ok(self.store_read.access.read(hash)?.interval)
        }
    }

    fn get_parent(&self, hash: Hash) -> Result<Hash, StoreError> {
        self.check_not_deleted(hash)?;
        if let Some(data) = self.staging_writes.get(&hash) {
            Ok(data.parent)
        } else {
            Ok(self.store_read.access.read(hash)?.parent)
        }
    }

    fn get_height(&self, hash: Hash) -> Result<u64, StoreError> {
        self.check_not_deleted(hash)?;
        if let Some(data) = self.staging_writes.get(&hash) {
            Ok(data.height)
        } else {
            Ok(self.store_read.access.read(hash)?.height)
        }
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        self.check_not_deleted(hash)?;
        if let Some(data) = self.staging_writes.get(&hash) {
            Ok(BlockHashes::clone(&data.children))
        } else {
            Ok(BlockHashes::clone(&self.store_read.access.read(hash)?.children))
        }
    }

    fn get_future_covering_set(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        self.check_not_deleted(hash)?;
        if let Some(data) = self.staging_writes.get(&hash) {
            Ok(BlockHashes::clone(&data.future_covering_set))
        } else {
            Ok(BlockHashes::clone(&self.store_read.access.read(hash)?.future_covering_set))
        }
    }
}

/// An in-memory implementation of `ReachabilityStore` to be used for tests
pub struct MemoryReachabilityStore {
    map: BlockHashMap<ReachabilityData>,
    reindex_root: Option<Hash>,
}

impl Default for MemoryReachabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReachabilityStore {
    pub fn new() -> Self {
        Self { map: BlockHashMap::new(), reindex_root: None }
    }

    fn get_data_mut(&mut self, hash: Hash) -> Result<&mut ReachabilityData, StoreError> {
        match self.map.get_mut(&hash) {
            Some(data) => Ok(data),
            None => Err(StoreError::KeyNotFound(DbKey::new(b"memory-reachability", hash))),
        }
    }

    fn get_data(&self, hash: Hash) -> Result<&ReachabilityData, StoreError> {
        match self.map.get(&hash) {
            Some(data) => Ok(data),
            None => Err(StoreError::KeyNotFound(DbKey::new(b"memory-reachability", hash))),
        }
    }
}

impl ReachabilityStore for MemoryReachabilityStore {
    fn init(&mut self, origin: Hash, capacity: Interval) -> Result<(), StoreError> {
        self.insert(origin, Hash::default(), capacity, 0)?;
        self.set_reindex_root(origin)?;
        Ok(())
    }

    fn insert(&mut self, hash: Hash, parent: Hash, interval: Interval, height: u64) -> Result<(), StoreError> {
        if let Vacant(e) = self.map.entry(hash) {
            e.insert(ReachabilityData::new(parent, interval, height));
            Ok(())
        } else {
            Err(StoreError::KeyAlreadyExists(hash.to_string()))
        }
    }

    fn set_interval(&mut self, hash: Hash, interval: Interval) -> Result<(), StoreError> {
        self.get_data_mut(hash)?.interval = interval;
        Ok(())
    }

    fn set_parent(&mut self, hash: Hash, new_parent: Hash) -> Result<(), StoreError> {
        self.get_data_mut(hash)?.parent = new_parent;
        Ok(())
    }

    fn append_child(&mut self, hash: Hash, child: Hash) -> Result<u64, StoreError> {
        let data = self.get_data_mut(hash)?;
        Arc::make_mut(&mut data.children).push(child);
        Ok(data.height)
    }

    fn replace_child(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        let data = self.get_data_mut(hash)?;
        replace_in_list(Arc::make_mut(&mut data.children), replaced, replace_with);
        Ok(())
    }

    fn insert_future_covering_item(&mut self, hash: Hash, fci: Hash, insertion_index: usize) -> Result<(), StoreError> {
        let data = self.get_data_mut(hash)?;
        Arc::make_mut(&mut data.future_covering_set).insert(insertion_index, fci);
        Ok(())
    }

    fn replace_future_covering_item(&mut self, hash: Hash, replaced: Hash, replace_with: &[Hash]) -> Result<(), StoreError> {
        let data = self.get_data_mut(hash)?;
        replace_in_list(Arc::make_mut(&mut data.future_covering_set), replaced, replace_with);
        Ok(())
    }

    fn delete(&mut self, hash: Hash) -> Result<(), StoreError> {
        self.map.remove(&hash);
        Ok(())
    }

    fn set_reindex_root(&mut self, root: Hash) -> Result<(), StoreError> {
        self.reindex_root = Some(root);
        Ok(())
    }

    fn get_reindex_root(&self) -> Result<Hash, StoreError> {
        match self.reindex_root {
            Some(root) => Ok(root),
            None => Err(StoreError::KeyNotFound(DbKey::prefix_only(b"reindex-root"))),
        }
    }
}

impl ReachabilityStoreReader for MemoryReachabilityStore {
    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        Ok(self.map.contains_key(&hash))
    }

    fn get_interval(&self, hash: Hash) -> Result<Interval, StoreError> {
        Ok(self.get_data(hash)?.interval)
    }

    fn get_parent(&self, hash: Hash) -> Result<Hash, StoreError> {
        Ok(self.get_data(hash)?.parent)
    }

    fn get_height(&self, hash: Hash) -> Result<u64, StoreError> {
        Ok(self.get_data(hash)?.height)
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(Arc::clone(&self.get_data(hash)?.children))
    }

    fn get_future_covering_set(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        Ok(Arc::clone(&self.get_data(hash)?.future_covering_set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_basics() {
        let mut store: Box<dyn ReachabilityStore> = Box::new(MemoryReachabilityStore::new());
        let (hash, parent) = (Hash::from_u64_word(7), Hash::from_u64_word(15));
        let interval = Interval::maximal();
        store.insert(hash, parent, interval, 5).unwrap();
        let height = store.append_child(hash, Hash::from_u64_word(31)).unwrap();
        assert_eq!(height, 5);
        let children = store.get_children(hash).unwrap();
        assert_eq!(children.as_slice(), &[Hash::from_u64_word(31)]);
        store.replace_child(hash, Hash::from_u64_word(31), &[Hash::from_u64_word(32), Hash::from_u64_word(33)]).unwrap();
        let children = store.get_children(hash).unwrap();
        assert_eq!(children.as_slice(), &[Hash::from_u64_word(32), Hash::from_u64_word(33)]);
        store.delete(hash).unwrap();
        assert!(!store.has(hash).unwrap());
    }
}
