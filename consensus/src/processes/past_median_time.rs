use crate::model::stores::{ghostdag::GhostdagData, headers::HeaderStoreReader};
use crate::processes::traversal_manager::BlockWindowHeap;
use std::sync::Arc;

#[derive(Clone)]
pub struct PastMedianTimeManager<T: HeaderStoreReader> {
    headers_store: Arc<T>,
    genesis_timestamp: u64,
}

impl<T: HeaderStoreReader> PastMedianTimeManager<T> {
    pub fn new(headers_store: Arc<T>, genesis_timestamp: u64) -> Self {
        Self { headers_store, genesis_timestamp }
    }

    /// The median timestamp of the block's blue window. A block timestamp is
    /// required to be strictly above this value, and it also serves as the
    /// lock-time comparand for non-final transactions.
    pub fn calc_past_median_time(&self, _ghostdag_data: &GhostdagData, window: &BlockWindowHeap) -> u64 {
        if window.is_empty() {
            // Genesis has no past to take a median of
            return self.genesis_timestamp;
        }
        let mut timestamps: Vec<u64> =
            window.iter().map(|item| self.headers_store.get_timestamp(item.0.hash).unwrap()).collect();
        timestamps.sort_unstable();
        timestamps[timestamps.len() / 2]
    }
}
