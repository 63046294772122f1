use std::{cmp::Reverse, collections::BinaryHeap, collections::VecDeque, sync::Arc};

use crate::{
    model::{
        services::reachability::{MTReachabilityService, ReachabilityService},
        stores::{
            ghostdag::{GhostdagData, GhostdagStoreReader},
            reachability::ReachabilityStoreReader,
            relations::RelationsStoreReader,
        },
    },
    processes::ghostdag::ordering::SortableBlock,
};
use itertools::Itertools;
use kyanite_consensus_core::{
    blockhash::BlockHashExtensions,
    errors::consensus::{ConsensusError, ConsensusResult},
    BlockHashSet, BlueWorkType, ChainPath, HashMapCustomHasher,
};
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;

pub type BlockWindowHeap = BinaryHeap<Reverse<SortableBlock>>;

#[derive(Clone)]
pub struct DagTraversalManager<T: GhostdagStoreReader, U: ReachabilityStoreReader + ?Sized, V: RelationsStoreReader> {
    genesis_hash: Hash,
    ghostdag_store: Arc<T>,
    relations_store: V,
    reachability_service: MTReachabilityService<U>,
}

impl<T: GhostdagStoreReader, U: ReachabilityStoreReader + ?Sized, V: RelationsStoreReader> DagTraversalManager<T, U, V> {
    pub fn new(
        genesis_hash: Hash,
        ghostdag_store: Arc<T>,
        relations_store: V,
        reachability_service: MTReachabilityService<U>,
    ) -> Self {
        Self { genesis_hash, ghostdag_store, relations_store, reachability_service }
    }

    /// Builds the blue window of the block with the given GHOSTDAG data: the
    /// `window_size` highest-blue-work blocks reached by walking backwards
    /// through the merge sets along the selected parent chain
    pub fn block_window(&self, high_ghostdag_data: &GhostdagData, window_size: usize) -> BlockWindowHeap {
        let mut window_heap = BoundedSizeBlockHeap::new(window_size);
        if window_size == 0 {
            return window_heap.binary_heap;
        }

        let mut current_ghostdag = high_ghostdag_data.clone();

        // Walk down the chain until we cross the window boundaries
        loop {
            if current_ghostdag.selected_parent.is_origin() {
                break;
            }

            let parent_ghostdag = match self.ghostdag_store.get_data(current_ghostdag.selected_parent).unwrap_option() {
                Some(data) => data,
                // The chain is pruned below this point
                None => break,
            };
            let selected_parent_blue_work_too_low =
                self.try_push_mergeset(&mut window_heap, &current_ghostdag, parent_ghostdag.blue_work);
            // No need to further iterate since past of selected parent has even lower blue work
            if selected_parent_blue_work_too_low {
                break;
            }

            if current_ghostdag.selected_parent == self.genesis_hash {
                break;
            }
            current_ghostdag = (*parent_ghostdag).clone();
        }

        window_heap.binary_heap
    }

    fn try_push_mergeset(
        &self,
        heap: &mut BoundedSizeBlockHeap,
        ghostdag_data: &GhostdagData,
        selected_parent_blue_work: BlueWorkType,
    ) -> bool {
        // If the window is full and the selected parent is less than the minimum then we break
        // because this means that there cannot be any more blocks in the past with higher blue work
        if !heap.try_push(ghostdag_data.selected_parent, selected_parent_blue_work) {
            return true;
        }
        for block in ghostdag_data.descending_mergeset_without_selected_parent(self.ghostdag_store.as_ref()) {
            // If it's smaller than minimum then we won't be able to add the rest because we iterate in descending blue work order.
            if !heap.try_push(block.hash, block.blue_work) {
                break;
            }
        }
        false
    }

    /// Calculates the chain delta between the previous and the new virtual
    /// selected parents. `removed` is ordered high-to-low, `added` low-to-high.
    pub fn calculate_chain_path(&self, from: Hash, to: Hash) -> ChainPath {
        let mut removed = Vec::new();
        let mut common_ancestor = from;
        for current in self.reachability_service.default_backward_chain_iterator(from) {
            if !self.reachability_service.is_chain_ancestor_of(current, to) {
                removed.push(current);
            } else {
                common_ancestor = current;
                break;
            }
        }
        // It is more intuitive to use a forward iterator here, but going
        // downwards the selected chain is faster
        let mut added = self.reachability_service.backward_chain_iterator(to, common_ancestor, false).collect_vec();
        added.reverse();
        ChainPath { added, removed }
    }

    /// The anticone of `block`: a BFS from the tips downwards, excluding
    /// ancestors and descendants of the block via the reachability oracle
    pub fn anticone(&self, block: Hash, tips: impl Iterator<Item = Hash>) -> Vec<Hash> {
        let mut anticone = Vec::new();
        let mut queue = VecDeque::from_iter(tips);
        let mut visited = BlockHashSet::new();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }

            if self.reachability_service.is_dag_ancestor_of(current, block) {
                continue;
            }

            if !self.reachability_service.is_dag_ancestor_of(block, current) {
                anticone.push(current);
            }

            for parent in self.relations_store.get_parents(current).unwrap().iter().copied() {
                queue.push_back(parent);
            }
        }

        anticone
    }

    /// Direct-relation query: whether `a` is listed as a parent of `b`
    pub fn is_parent_of(&self, a: Hash, b: Hash) -> ConsensusResult<bool> {
        Ok(self.relations_store.get_parents(b).map_err(|_| ConsensusError::BlockNotFound(b))?.contains(&a))
    }

    /// Direct-relation query: whether `a` is listed as a child of `b`
    pub fn is_child_of(&self, a: Hash, b: Hash) -> ConsensusResult<bool> {
        Ok(self.relations_store.get_children(b).map_err(|_| ConsensusError::BlockNotFound(b))?.contains(&a))
    }

    pub fn is_ancestor_of(&self, a: Hash, b: Hash) -> bool {
        self.reachability_service.is_dag_ancestor_of(a, b)
    }

    pub fn is_descendant_of(&self, a: Hash, b: Hash) -> bool {
        self.reachability_service.is_dag_ancestor_of(b, a)
    }

    pub fn is_ancestor_of_any(&self, a: Hash, list: &mut impl Iterator<Item = Hash>) -> bool {
        self.reachability_service.is_dag_ancestor_of_any(a, list)
    }

    /// Whether `a` lies on the chain walking `selected_parent` upward from `b`
    pub fn is_in_selected_parent_chain_of(&self, a: Hash, b: Hash) -> bool {
        self.reachability_service.is_chain_ancestor_of(a, b)
    }

    /// Binary-search analogue over the selected parent chain of `high`:
    /// returns the earliest (lowest) chain block whose blue score is within
    /// `blue_score_bound`, i.e. the highest chain block B such that
    /// `blue_score(B) ≤ blue_score_bound`
    pub fn highest_chain_block_below_blue_score(&self, high: Hash, blue_score_bound: u64) -> ConsensusResult<Hash> {
        let mut current = high;
        loop {
            let data = self
                .ghostdag_store
                .get_compact_data(current)
                .map_err(|_| ConsensusError::BlockNotFound(current))?;
            if data.blue_score <= blue_score_bound {
                return Ok(current);
            }
            if current == self.genesis_hash {
                return Ok(current);
            }
            match self.ghostdag_store.get_compact_data(data.selected_parent) {
                Ok(_) => current = data.selected_parent,
                // Pruned below; the current block is the lowest reachable
                Err(_) => return Ok(current),
            }
        }
    }
}

struct BoundedSizeBlockHeap {
    binary_heap: BlockWindowHeap,
    size_bound: usize,
}

impl BoundedSizeBlockHeap {
    fn new(size_bound: usize) -> Self {
        Self { size_bound, binary_heap: BinaryHeap::with_capacity(size_bound) }
    }

    fn reached_size_bound(&self) -> bool {
        self.binary_heap.len() == self.size_bound
    }

    fn try_push(&mut self, hash: Hash, blue_work: BlueWorkType) -> bool {
        let r_sortable_block = Reverse(SortableBlock { hash, blue_work });
        if self.reached_size_bound() {
            if let Some(max) = self.binary_heap.peek() {
                if *max < r_sortable_block {
                    return false; // Heap is full and the suggested block is greater than the max
                }
            }
            self.binary_heap.pop(); // Remove the max block (because it's reverse, it'll be the block with the least blue work)
        }
        self.binary_heap.push(r_sortable_block);
        true
    }
}
