use std::sync::Arc;

use crate::model::{
    services::reachability::{MTReachabilityService, ReachabilityService},
    stores::{
        ghostdag::{CompactGhostdagData, GhostdagStoreReader},
        reachability::ReachabilityStoreReader,
    },
};
use kyanite_hashes::Hash;

/// Decides the movement of the pruning point: the highest chain block whose
/// blue score is deep enough below the virtual, and which is known to be on
/// the stable (finalized) part of the chain
#[derive(Clone)]
pub struct PruningManager<S: GhostdagStoreReader, T: ReachabilityStoreReader + ?Sized> {
    pruning_depth: u64,
    finality_depth: u64,
    genesis_hash: Hash,
    reachability_service: MTReachabilityService<T>,
    ghostdag_store: Arc<S>,
}

impl<S: GhostdagStoreReader, T: ReachabilityStoreReader + ?Sized> PruningManager<S, T> {
    pub fn new(
        pruning_depth: u64,
        finality_depth: u64,
        genesis_hash: Hash,
        reachability_service: MTReachabilityService<T>,
        ghostdag_store: Arc<S>,
    ) -> Self {
        Self { pruning_depth, finality_depth, genesis_hash, reachability_service, ghostdag_store }
    }

    /// Computes the next pruning point and candidate given the new virtual
    /// GHOSTDAG data. The pruning point advances along the virtual selected
    /// chain to the highest block which is at least `pruning_depth` below the
    /// virtual blue score and is in the past of the current finality point
    /// (the stability criterion, so finality conflicts can never prune).
    pub fn next_pruning_point_and_candidate(
        &self,
        virtual_ghostdag: CompactGhostdagData,
        virtual_finality_point: Hash,
        current_candidate: Hash,
        current_pruning_point: Hash,
    ) -> (Hash, Hash) {
        if virtual_ghostdag.blue_score < self.pruning_depth {
            return (current_pruning_point, current_candidate);
        }
        let target_score = virtual_ghostdag.blue_score - self.pruning_depth;

        let mut new_pruning_point = current_pruning_point;
        let mut new_candidate = current_candidate;

        // Walk up from the current candidate towards the virtual selected
        // parent; any chain block deep enough becomes the new pruning point
        let low = if self.reachability_service.is_chain_ancestor_of(current_candidate, virtual_ghostdag.selected_parent) {
            current_candidate
        } else {
            current_pruning_point
        };
        for current in self.reachability_service.forward_chain_iterator(low, virtual_ghostdag.selected_parent, true) {
            let score = match self.ghostdag_store.get_blue_score(current) {
                Ok(score) => score,
                Err(_) => break,
            };
            if score > target_score {
                break;
            }
            new_candidate = current;
            // Stability: only finalized chain blocks may become the pruning point
            if current == self.genesis_hash || self.reachability_service.is_chain_ancestor_of(current, virtual_finality_point) {
                new_pruning_point = current;
            }
        }

        (new_pruning_point, new_candidate)
    }

    pub fn pruning_depth(&self) -> u64 {
        self.pruning_depth
    }

    pub fn finality_depth(&self) -> u64 {
        self.finality_depth
    }
}
