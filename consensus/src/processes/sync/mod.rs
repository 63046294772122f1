use std::{cmp::max, iter::once, sync::Arc};

use kyanite_consensus_core::errors::sync::{SyncManagerError, SyncManagerResult};
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;
use parking_lot::RwLock;

use crate::model::{
    services::reachability::{MTReachabilityService, ReachabilityService},
    stores::{
        ghostdag::GhostdagStoreReader,
        reachability::ReachabilityStoreReader,
        selected_chain::SelectedChainStoreReader,
        statuses::{StatusesStoreReader, DbStatusesStore},
    },
};

/// The maximal number of hashes returned by a single antipast query
pub const MAX_HASHES_BETWEEN: usize = 1 << 17;

#[derive(Clone)]
pub struct SyncManager<T: ReachabilityStoreReader + ?Sized, U: GhostdagStoreReader, V: SelectedChainStoreReader> {
    mergeset_size_limit: usize,
    reachability_service: MTReachabilityService<T>,
    ghostdag_store: Arc<U>,
    selected_chain_store: Arc<RwLock<V>>,
    statuses_store: Arc<RwLock<DbStatusesStore>>,
}

impl<T: ReachabilityStoreReader + ?Sized, U: GhostdagStoreReader, V: SelectedChainStoreReader> SyncManager<T, U, V> {
    pub fn new(
        mergeset_size_limit: usize,
        reachability_service: MTReachabilityService<T>,
        ghostdag_store: Arc<U>,
        selected_chain_store: Arc<RwLock<V>>,
        statuses_store: Arc<RwLock<DbStatusesStore>>,
    ) -> Self {
        Self { mergeset_size_limit, reachability_service, ghostdag_store, selected_chain_store, statuses_store }
    }

    /// Returns the blocks in `past(high) ∩ future(low)` (the antipast slice
    /// used by the p2p layer), in the canonical consensus order, along with
    /// the highest chain block actually covered. The result is capped at
    /// `max_blocks` which must be at least the merge-set size limit.
    pub fn get_hashes_between(&self, low: Hash, high: Hash, max_blocks: usize) -> (Vec<Hash>, Hash) {
        assert!(max_blocks >= self.mergeset_size_limit);

        let low_bs = self.ghostdag_store.get_blue_score(low).unwrap();
        let high_bs = self.ghostdag_store.get_blue_score(high).unwrap();
        assert!(low_bs <= high_bs);

        // If low is not in the chain of high - forward_chain_iterator will fail.
        // Therefore, we traverse down low's chain until we reach a block that is in
        // high's chain. We keep the original low to filter out blocks in its past
        // later down the road.
        let original_low = low;
        let low = self.find_higher_common_chain_block(low, high);
        let mut highest = None;
        let mut blocks = Vec::with_capacity(max(max_blocks, (high_bs - low_bs) as usize));
        for current in self.reachability_service.forward_chain_iterator(low, high, true).skip(1) {
            let gd = self.ghostdag_store.get_data(current).unwrap();
            if blocks.len() + gd.mergeset_size() > max_blocks {
                break;
            }

            highest = Some(current);
            // Each chain block contributes its merge set, which covers the
            // chain block below it (the selected parent) as well
            blocks.extend(
                once(gd.selected_parent)
                    .chain(gd.ascending_mergeset_without_selected_parent(self.ghostdag_store.as_ref()).map(|sb| sb.hash))
                    .filter(|hash| !self.reachability_service.is_dag_ancestor_of(*hash, original_low)),
            );
        }

        // The chain blocks contribute each other via merge sets, so the
        // highest covered chain block itself is added explicitly
        let highest = match highest {
            Some(highest) => {
                blocks.push(highest);
                highest
            }
            None => low,
        };

        (blocks, highest)
    }

    fn find_higher_common_chain_block(&self, low: Hash, high: Hash) -> Hash {
        self.reachability_service
            .default_backward_chain_iterator(low)
            .find(|candidate| self.reachability_service.is_chain_ancestor_of(*candidate, high))
            .expect("because of the pruning rules such a block must exist")
    }

    /// Returns the header-only ancestors of `high` above `low` (blocks
    /// missing a body), ordered by the canonical consensus order
    pub fn get_missing_block_body_hashes(&self, high: Hash, low: Hash) -> Vec<Hash> {
        let mut missing = Vec::new();
        let mut push_if_header_only = |block: Hash| {
            if block != low && self.statuses_store.read().get(block).unwrap().is_header_only() {
                missing.push(block);
            }
        };
        for current in self.reachability_service.forward_chain_iterator(low, high, true).skip(1) {
            let gd = self.ghostdag_store.get_data(current).unwrap();
            for block in once(gd.selected_parent)
                .chain(gd.ascending_mergeset_without_selected_parent(self.ghostdag_store.as_ref()).map(|sb| sb.hash))
            {
                push_if_header_only(block);
            }
        }
        push_if_header_only(high);
        missing
    }

    /// Builds a locator with exponentially-spaced selected-parent-chain
    /// points from `high` down to `low` (both must be chain blocks)
    pub fn create_block_locator(&self, low: Hash, high: Hash) -> SyncManagerResult<Vec<Hash>> {
        if low == high {
            return Ok(vec![low]);
        }

        let sc_read = self.selected_chain_store.read();
        let low_index = match sc_read.get_by_hash(low).unwrap_option() {
            Some(index) => index,
            None => return Err(SyncManagerError::BlockNotInSelectedParentChain(low)),
        };
        let high_index = match sc_read.get_by_hash(high).unwrap_option() {
            Some(index) => index,
            None => return Err(SyncManagerError::BlockNotInSelectedParentChain(high)),
        };
        if low_index > high_index {
            return Err(SyncManagerError::LowHashHigherThanHighHash(low, high));
        }

        let mut locator = Vec::new();
        let mut step = 1;
        let mut current_index = high_index;
        while current_index > low_index {
            locator.push(sc_read.get_by_index(current_index).unwrap());
            if current_index < low_index + step {
                break;
            }
            current_index -= step;
            step *= 2;
        }
        locator.push(low);

        Ok(locator)
    }

    /// Zooms-in on the lowest locator segment bracketing the sync split
    /// point: returns (highest known block, lowest unknown block)
    pub fn find_next_block_locator_boundaries(&self, locator: &[Hash]) -> SyncManagerResult<(Hash, Hash)> {
        // The locator is ordered high to low. Find the first known block.
        let first_known_index = locator
            .iter()
            .position(|&hash| self.statuses_store.read().has(hash).unwrap())
            .ok_or(SyncManagerError::LocatorHashesAllUnknown)?;

        let low = locator[first_known_index];
        let high = if first_known_index == 0 { low } else { locator[first_known_index - 1] };
        Ok((low, high))
    }
}
