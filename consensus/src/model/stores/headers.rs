use kyanite_consensus_core::header::Header;
use kyanite_database::prelude::{BatchDbWriter, CachedDbAccess, CachedDbItem, StoreError, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use kyanite_hashes::Hash;
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub trait HeaderStoreReader {
    fn get_timestamp(&self, hash: Hash) -> Result<u64, StoreError>;
    fn get_bits(&self, hash: Hash) -> Result<u32, StoreError>;
    fn get_header(&self, hash: Hash) -> Result<Arc<Header>, StoreError>;
    fn get_compact_header_data(&self, hash: Hash) -> Result<CompactHeaderData, StoreError>;
    fn has(&self, hash: Hash) -> StoreResult<bool>;
    /// The number of headers ever committed (not decreased by pruning)
    fn count(&self) -> StoreResult<u64>;
}

pub trait HeaderStore: HeaderStoreReader {
    // This is append only
    fn insert(&self, hash: Hash, header: Arc<Header>) -> Result<(), StoreError>;
}

/// A projection of the hot header fields, kept under its own bucket so that
/// window/difficulty queries avoid deserializing whole headers
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct CompactHeaderData {
    pub timestamp: u64,
    pub bits: u32,
}

impl From<&Header> for CompactHeaderData {
    fn from(header: &Header) -> Self {
        Self { timestamp: header.timestamp, bits: header.bits }
    }
}

/// A DB + cache implementation of `HeaderStore` trait, with concurrency support.
#[derive(Clone)]
pub struct DbHeadersStore {
    db: Arc<DB>,
    compact_access: CachedDbAccess<Hash, CompactHeaderData>,
    access: CachedDbAccess<Hash, Arc<Header>>,
    count_item: CachedDbItem<u64>,
}

impl DbHeadersStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: Arc::clone(&db),
            compact_access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::HeadersCompact.into()),
            access: CachedDbAccess::new(Arc::clone(&db), cache_size, DatabaseStorePrefixes::Headers.into()),
            count_item: CachedDbItem::new(db, DatabaseStorePrefixes::HeadersCount.into()),
        }
    }

    pub fn insert_batch(&self, batch: &mut WriteBatch, hash: Hash, header: Arc<Header>) -> Result<(), StoreError> {
        if self.access.has(hash)? {
            return Err(StoreError::HashAlreadyExists(hash));
        }
        self.access.write(BatchDbWriter::new(batch), hash, header.clone())?;
        self.compact_access.write(BatchDbWriter::new(batch), hash, header.as_ref().into())?;
        let count = self.count().unwrap_or_default();
        self.count_item.clone().write(BatchDbWriter::new(batch), &(count + 1))?;
        Ok(())
    }
}

impl HeaderStoreReader for DbHeadersStore {
    fn get_timestamp(&self, hash: Hash) -> Result<u64, StoreError> {
        if let Some(header) = self.access.read_from_cache(hash) {
            return Ok(header.timestamp);
        }
        Ok(self.compact_access.read(hash)?.timestamp)
    }

    fn get_bits(&self, hash: Hash) -> Result<u32, StoreError> {
        if let Some(header) = self.access.read_from_cache(hash) {
            return Ok(header.bits);
        }
        Ok(self.compact_access.read(hash)?.bits)
    }

    fn get_header(&self, hash: Hash) -> Result<Arc<Header>, StoreError> {
        self.access.read(hash)
    }

    fn get_compact_header_data(&self, hash: Hash) -> Result<CompactHeaderData, StoreError> {
        if let Some(header) = self.access.read_from_cache(hash) {
            return Ok(header.as_ref().into());
        }
        self.compact_access.read(hash)
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

impl HeaderStore for DbHeadersStore {
    fn insert(&self, hash: Hash, header: Arc<Header>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.insert_batch(&mut batch, hash, header)?;
        self.db.write(batch)?;
        Ok(())
    }
}
