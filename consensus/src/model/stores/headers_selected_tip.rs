use crate::processes::ghostdag::ordering::SortableBlock;
use kyanite_database::prelude::{BatchDbWriter, CachedDbItem, StoreResult, DB};
use kyanite_database::registry::DatabaseStorePrefixes;
use rocksdb::WriteBatch;
use std::sync::Arc;

/// The headers-selected tip: the most blue-work header known, regardless of
/// body availability. Advances during headers-first sync.
pub trait HeadersSelectedTipStoreReader {
    fn get(&self) -> StoreResult<SortableBlock>;
}

pub trait HeadersSelectedTipStore: HeadersSelectedTipStoreReader {
    fn set_batch(&mut self, batch: &mut WriteBatch, block: SortableBlock) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct DbHeadersSelectedTipStore {
    access: CachedDbItem<SortableBlock>,
}

impl DbHeadersSelectedTipStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbItem::new(db, DatabaseStorePrefixes::HeadersSelectedTip.into()) }
    }

    pub fn is_initialized(&self) -> bool {
        self.access.read().is_ok()
    }
}

impl HeadersSelectedTipStoreReader for DbHeadersSelectedTipStore {
    fn get(&self) -> StoreResult<SortableBlock> {
        self.access.read()
    }
}

impl HeadersSelectedTipStore for DbHeadersSelectedTipStore {
    fn set_batch(&mut self, batch: &mut WriteBatch, block: SortableBlock) -> StoreResult<()> {
        self.access.write(BatchDbWriter::new(batch), &block)
    }
}
