use itertools::Itertools;
use kyanite_consensus_core::{blockhash::BlockHashes, BlockHashMap, HashMapCustomHasher};
use kyanite_database::prelude::{CachedDbAccess, DbKey, DbWriter, StoreError, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// Reader API for `RelationsStore`.
pub trait RelationsStoreReader {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError>;
    fn has(&self, hash: Hash) -> Result<bool, StoreError>;
}

/// Write API for `RelationsStore`. The insert function is deliberately `mut`
/// since it modifies the children arrays of the resolved parents.
pub trait RelationsStore: RelationsStoreReader {
    fn insert_with_writer(&mut self, writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError>;
    fn delete_entries_with_writer(&mut self, writer: impl DbWriter, hash: Hash) -> Result<(), StoreError>;
    /// Replaces `replaced` within the parents list of `hash`, deduplicating the replacement
    fn replace_parent_with_writer(
        &mut self,
        writer: impl DbWriter,
        hash: Hash,
        replaced: Hash,
        replace_with: Hash,
    ) -> Result<(), StoreError>;
}

/// A DB + cache implementation of `RelationsStore` trait, with concurrent readers support.
#[derive(Clone)]
pub struct DbRelationsStore {
    db: Arc<DB>,
    parents_access: CachedDbAccess<Hash, BlockHashes>,
    children_access: CachedDbAccess<Hash, BlockHashes>,
}

impl DbRelationsStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            parents_access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::RelationsParents.into()),
            children_access: CachedDbAccess::new(db, cache_size, DatabaseStorePrefixes::RelationsChildren.into()),
        }
    }

    pub fn insert_batch(&mut self, batch: &mut WriteBatch, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        self.insert_with_writer(kyanite_database::prelude::BatchDbWriter::new(batch), hash, parents)
    }
}

impl RelationsStoreReader for DbRelationsStore {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        self.parents_access.read(hash)
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        if !self.parents_access.has(hash)? {
            Err(StoreError::KeyNotFound(DbKey::new(self.children_access.prefix(), hash)))
        } else {
            self.children_access.read(hash)
        }
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        self.parents_access.has(hash)
    }
}

impl RelationsStore for DbRelationsStore {
    /// Inserts `parents` into the store as the parents of `hash` and appends
    /// `hash` to the children array of each of them
    fn insert_with_writer(&mut self, mut writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        if self.has(hash)? {
            return Err(StoreError::KeyAlreadyExists(hash.to_string()));
        }
        self.parents_access.write(&mut writer, hash, BlockHashes::clone(&parents))?;
        // The new block is initially a leaf
        self.children_access.write(&mut writer, hash, BlockHashes::new(Vec::new()))?;
        for parent in parents.iter().cloned() {
            let mut children = (*self.children_access.read(parent)?).clone();
            children.push(hash);
            self.children_access.write(&mut writer, parent, BlockHashes::new(children))?;
        }
        Ok(())
    }

    fn delete_entries_with_writer(&mut self, mut writer: impl DbWriter, hash: Hash) -> Result<(), StoreError> {
        // Remove `hash` from the children list of each of its parents
        for parent in self.get_parents(hash)?.iter().cloned() {
            if !self.has(parent)? {
                continue;
            }
            let children = self.children_access.read(parent)?.iter().copied().filter(|&h| h != hash).collect_vec();
            self.children_access.write(&mut writer, parent, BlockHashes::new(children))?;
        }
        self.parents_access.delete(&mut writer, hash)?;
        self.children_access.delete(&mut writer, hash)?;
        Ok(())
    }

    fn replace_parent_with_writer(
        &mut self,
        mut writer: impl DbWriter,
        hash: Hash,
        replaced: Hash,
        replace_with: Hash,
    ) -> Result<(), StoreError> {
        let parents = self
            .get_parents(hash)?
            .iter()
            .copied()
            .map(|p| if p == replaced { replace_with } else { p })
            .unique()
            .collect_vec();
        self.parents_access.write(&mut writer, hash, BlockHashes::new(parents))?;
        Ok(())
    }
}

/// An in-memory implementation of `RelationsStore` to be used for tests
pub struct MemoryRelationsStore {
    parents_map: BlockHashMap<BlockHashes>,
    children_map: BlockHashMap<BlockHashes>,
}

impl Default for MemoryRelationsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelationsStore {
    pub fn new() -> Self {
        Self { parents_map: BlockHashMap::new(), children_map: BlockHashMap::new() }
    }

    pub fn insert(&mut self, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        self.insert_with_writer(kyanite_database::prelude::MemoryWriter, hash, parents)
    }
}

impl RelationsStoreReader for MemoryRelationsStore {
    fn get_parents(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        match self.parents_map.get(&hash) {
            Some(parents) => Ok(BlockHashes::clone(parents)),
            None => Err(StoreError::KeyNotFound(DbKey::new(b"memory-relations", hash))),
        }
    }

    fn get_children(&self, hash: Hash) -> Result<BlockHashes, StoreError> {
        match self.children_map.get(&hash) {
            Some(children) => Ok(BlockHashes::clone(children)),
            None => Err(StoreError::KeyNotFound(DbKey::new(b"memory-relations", hash))),
        }
    }

    fn has(&self, hash: Hash) -> Result<bool, StoreError> {
        Ok(self.parents_map.contains_key(&hash))
    }
}

impl RelationsStore for MemoryRelationsStore {
    fn insert_with_writer(&mut self, _writer: impl DbWriter, hash: Hash, parents: BlockHashes) -> Result<(), StoreError> {
        if self.has(hash)? {
            return Err(StoreError::KeyAlreadyExists(hash.to_string()));
        }
        for parent in parents.iter().cloned() {
            let children = self.children_map.entry(parent).or_insert_with(|| BlockHashes::new(Vec::new()));
            Arc::make_mut(children).push(hash);
        }
        self.parents_map.insert(hash, parents);
        self.children_map.entry(hash).or_insert_with(|| BlockHashes::new(Vec::new()));
        Ok(())
    }

    fn delete_entries_with_writer(&mut self, _writer: impl DbWriter, hash: Hash) -> Result<(), StoreError> {
        if let Some(parents) = self.parents_map.remove(&hash) {
            for parent in parents.iter() {
                if let Some(children) = self.children_map.get_mut(parent) {
                    Arc::make_mut(children).retain(|&h| h != hash);
                }
            }
        }
        self.children_map.remove(&hash);
        Ok(())
    }

    fn replace_parent_with_writer(
        &mut self,
        _writer: impl DbWriter,
        hash: Hash,
        replaced: Hash,
        replace_with: Hash,
    ) -> Result<(), StoreError> {
        let parents = self
            .get_parents(hash)?
            .iter()
            .copied()
            .map(|p| if p == replaced { replace_with } else { p })
            .unique()
            .collect_vec();
        self.parents_map.insert(hash, BlockHashes::new(parents));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_relations() {
        let mut store = MemoryRelationsStore::new();
        store.insert(1.into(), BlockHashes::new(vec![])).unwrap();
        store.insert(2.into(), BlockHashes::new(vec![1.into()])).unwrap();
        store.insert(3.into(), BlockHashes::new(vec![1.into(), 2.into()])).unwrap();

        assert_eq!(store.get_parents(3.into()).unwrap().as_slice(), &[Hash::from(1u64), Hash::from(2u64)]);
        assert_eq!(store.get_children(1.into()).unwrap().as_slice(), &[Hash::from(2u64), Hash::from(3u64)]);

        store.delete_entries_with_writer(kyanite_database::prelude::MemoryWriter, 2.into()).unwrap();
        assert_eq!(store.get_children(1.into()).unwrap().as_slice(), &[Hash::from(3u64)]);
    }
}
