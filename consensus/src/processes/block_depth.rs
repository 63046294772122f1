use std::sync::Arc;

use crate::model::{
    services::reachability::{MTReachabilityService, ReachabilityService},
    stores::{
        depth::DepthStoreReader,
        ghostdag::{GhostdagData, GhostdagStoreReader},
        reachability::ReachabilityStoreReader,
    },
};
use kyanite_consensus_core::blockhash::BlockHashExtensions;
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;

/// Manages the merge-depth root and finality point of blocks: both are the
/// highest chain ancestors below a fixed blue-score depth from the block
#[derive(Clone)]
pub struct BlockDepthManager<S: DepthStoreReader, U: ReachabilityStoreReader + ?Sized, V: GhostdagStoreReader> {
    merge_depth: u64,
    finality_depth: u64,
    genesis_hash: Hash,
    depth_store: Arc<S>,
    reachability_service: MTReachabilityService<U>,
    ghostdag_store: Arc<V>,
}

impl<S: DepthStoreReader, U: ReachabilityStoreReader + ?Sized, V: GhostdagStoreReader> BlockDepthManager<S, U, V> {
    pub fn new(
        merge_depth: u64,
        finality_depth: u64,
        genesis_hash: Hash,
        depth_store: Arc<S>,
        reachability_service: MTReachabilityService<U>,
        ghostdag_store: Arc<V>,
    ) -> Self {
        Self { merge_depth, finality_depth, genesis_hash, depth_store, reachability_service, ghostdag_store }
    }

    pub fn calc_merge_depth_root(&self, ghostdag_data: &GhostdagData, pruning_point: Hash) -> Hash {
        self.calculate_block_at_depth(ghostdag_data, self.merge_depth, pruning_point)
    }

    pub fn calc_finality_point(&self, ghostdag_data: &GhostdagData, pruning_point: Hash) -> Hash {
        self.calculate_block_at_depth(ghostdag_data, self.finality_depth, pruning_point)
    }

    /// The highest chain ancestor of the block (described by `ghostdag_data`)
    /// whose blue score is at least `depth` below the block's blue score.
    /// The walk reuses the anchors stored for the selected parent whenever
    /// possible, so the amortized cost is O(1) chain steps per block.
    fn calculate_block_at_depth(&self, ghostdag_data: &GhostdagData, depth: u64, pruning_point: Hash) -> Hash {
        if ghostdag_data.blue_score < depth {
            return self.genesis_hash;
        }

        let target_blue_score = ghostdag_data.blue_score - depth;

        // Start from the anchor stored for the selected parent (which is
        // never above the target since scores only grow along the chain)
        let mut current = match depth {
            d if d == self.merge_depth => self.depth_store.merge_depth_root(ghostdag_data.selected_parent).unwrap_option(),
            d if d == self.finality_depth => self.depth_store.finality_point(ghostdag_data.selected_parent).unwrap_option(),
            _ => None,
        }
        .unwrap_or(pruning_point);

        if current.is_origin() || current.is_none() {
            current = if pruning_point.is_origin() || pruning_point.is_none() { self.genesis_hash } else { pruning_point };
        }

        // Walk up the selected chain of the new block until passing the target score
        loop {
            let next = match self.reachability_service.is_chain_ancestor_of(current, ghostdag_data.selected_parent) {
                true if current != ghostdag_data.selected_parent => {
                    self.reachability_service.get_next_chain_ancestor(ghostdag_data.selected_parent, current)
                }
                _ => break,
            };
            if self.ghostdag_store.get_blue_score(next).unwrap() > target_blue_score {
                break;
            }
            current = next;
        }

        current
    }

    /// Returns the merge-set blues of the block which are in the future of
    /// its merge depth root. These blues can "kosherize" (justify the merge
    /// of) red blocks violating the merge depth bound.
    pub fn kosherizing_blues<'a>(
        &'a self,
        ghostdag_data: &'a GhostdagData,
        merge_depth_root: Hash,
    ) -> impl DoubleEndedIterator<Item = Hash> + 'a {
        ghostdag_data
            .mergeset_blues
            .iter()
            .copied()
            .filter(move |blue| self.reachability_service.is_dag_ancestor_of(merge_depth_root, *blue))
    }
}
