//!
//! Test utils for reachability
//!
use super::{inquirer::*, interval::Interval};
use crate::{constants::perf, model::stores::reachability::{ReachabilityStore, ReachabilityStoreReader}};
use kyanite_consensus_core::{blockhash::ORIGIN, BlockHashMap, BlockHashSet, HashMapCustomHasher};
use kyanite_database::prelude::StoreError;
use kyanite_hashes::Hash;
use std::collections::VecDeque;
use thiserror::Error;

/// A struct with fluent API to streamline reachability store building
pub struct StoreBuilder<'a, T: ReachabilityStore + ?Sized> {
    store: &'a mut T,
}

impl<'a, T: ReachabilityStore + ?Sized> StoreBuilder<'a, T> {
    pub fn new(store: &'a mut T) -> Self {
        Self { store }
    }

    pub fn add_block(&mut self, hash: Hash, parent: Hash) -> &mut Self {
        let parent_height = if parent != Hash::default() { self.store.append_child(parent, hash).unwrap() } else { 0 };
        self.store.insert(hash, parent, Interval::empty(), parent_height + 1).unwrap();
        self
    }
}

/// A struct with fluent API to streamline tree building
pub struct TreeBuilder<'a, T: ReachabilityStore + ?Sized> {
    store: &'a mut T,
    reindex_depth: u64,
    reindex_slack: u64,
}

impl<'a, T: ReachabilityStore + ?Sized> TreeBuilder<'a, T> {
    pub fn new(store: &'a mut T) -> Self {
        Self { store, reindex_depth: perf::DEFAULT_REINDEX_DEPTH, reindex_slack: perf::DEFAULT_REINDEX_SLACK }
    }

    pub fn new_with_params(store: &'a mut T, reindex_depth: u64, reindex_slack: u64) -> Self {
        Self { store, reindex_depth, reindex_slack }
    }

    pub fn init(&mut self) -> &mut Self {
        init(self.store).unwrap();
        self
    }

    pub fn init_with_params(&mut self, origin: Hash, capacity: Interval) -> &mut Self {
        init_with_params(self.store, origin, capacity).unwrap();
        self
    }

    pub fn add_block(&mut self, hash: Hash, parent: Hash) -> &mut Self {
        add_tree_child(self.store, parent, hash, self.reindex_depth, self.reindex_slack).unwrap();
        try_advancing_reindex_root(self.store, hash, self.reindex_depth, self.reindex_slack).unwrap();
        self
    }

    pub fn store(&self) -> &&'a mut T {
        &self.store
    }
}

#[derive(Clone)]
pub struct DagBlock {
    pub hash: Hash,
    pub parents: Vec<Hash>,
}

impl DagBlock {
    pub fn new(hash: Hash, parents: Vec<Hash>) -> Self {
        Self { hash, parents }
    }
}

/// A struct with fluent API to streamline DAG building. Tracks the DAG
/// relations on its own, so the reachability store can be driven without a
/// full relations store.
pub struct DagBuilder<'a, T: ReachabilityStore + ?Sized> {
    store: &'a mut T,
    parents_map: BlockHashMap<Vec<Hash>>,
}

impl<'a, T: ReachabilityStore + ?Sized> DagBuilder<'a, T> {
    pub fn new(store: &'a mut T) -> Self {
        Self { store, parents_map: BlockHashMap::new() }
    }

    pub fn init(&mut self) -> &mut Self {
        init(self.store).unwrap();
        self
    }

    pub fn add_block(&mut self, block: DagBlock) -> &mut Self {
        // Select by height (longest chain) just for the sake of internal isolated tests
        let selected_parent = block.parents.iter().cloned().max_by_key(|p| self.store.get_height(*p).unwrap()).unwrap();
        let mergeset = self.mergeset(&block, selected_parent);
        add_block(self.store, block.hash, selected_parent, &mut mergeset.iter().cloned()).unwrap();
        hint_virtual_selected_parent(self.store, block.hash).unwrap();
        self.parents_map.insert(block.hash, block.parents);
        self
    }

    /// The merge set of the new block: its past intersected with the
    /// anticone of the selected parent, computed by explicit BFS
    fn mergeset(&self, block: &DagBlock, selected_parent: Hash) -> Vec<Hash> {
        let mut mergeset = BlockHashSet::new();
        let mut past = BlockHashSet::new();
        let mut queue: VecDeque<Hash> =
            block.parents.iter().copied().filter(|&p| p != selected_parent && !is_dag_ancestor_of(self.store, p, selected_parent).unwrap()).collect();
        mergeset.extend(queue.iter().copied());
        while let Some(current) = queue.pop_front() {
            for parent in self.parents_map.get(&current).cloned().unwrap_or_default() {
                if mergeset.contains(&parent) || past.contains(&parent) {
                    continue;
                }
                if is_dag_ancestor_of(self.store, parent, selected_parent).unwrap() {
                    past.insert(parent);
                    continue;
                }
                mergeset.insert(parent);
                queue.push_back(parent);
            }
        }
        mergeset.into_iter().collect()
    }

    pub fn store(&self) -> &&'a mut T {
        &self.store
    }
}

#[derive(Error, Debug)]
pub enum TestError {
    #[error("data store error")]
    StoreError(#[from] StoreError),

    #[error("empty interval")]
    EmptyInterval(Hash, Interval),

    #[error("sibling intervals are expected to be consecutive")]
    NonConsecutiveSiblingIntervals(Interval, Interval),

    #[error("future covering set intervals are expected to be ordered")]
    NonOrderedFutureCoveringItems(Interval, Interval),

    #[error("child interval out of parent bounds")]
    IntervalOutOfParentBounds { parent: Hash, child: Hash, parent_interval: Interval, child_interval: Interval },
}

pub trait StoreValidationExtensions {
    /// Checks if `block` is in the past of `other` (creates hashes from the u64 numbers)
    fn in_past_of(&self, block: u64, other: u64) -> bool;

    /// Checks if `block` and `other` are in the anticone of each other
    /// (creates hashes from the u64 numbers)
    fn are_anticone(&self, block: u64, other: u64) -> bool;

    /// Validates that all tree intervals match the expected interval relations
    fn validate_intervals(&self, root: Hash) -> std::result::Result<(), TestError>;
}

impl<T: ReachabilityStoreReader + ?Sized> StoreValidationExtensions for T {
    fn in_past_of(&self, block: u64, other: u64) -> bool {
        if block == other {
            return false;
        }
        let res = is_dag_ancestor_of(self, block.into(), other.into()).unwrap();
        if res {
            // Assert that the `future` relation is indeed asymmetric
            assert!(!is_dag_ancestor_of(self, other.into(), block.into()).unwrap())
        }
        res
    }

    fn are_anticone(&self, block: u64, other: u64) -> bool {
        !is_dag_ancestor_of(self, block.into(), other.into()).unwrap()
            && !is_dag_ancestor_of(self, other.into(), block.into()).unwrap()
    }

    fn validate_intervals(&self, root: Hash) -> std::result::Result<(), TestError> {
        let mut queue = VecDeque::<Hash>::from([root]);
        while let Some(parent) = queue.pop_front() {
            let children = self.get_children(parent)?;
            queue.extend(children.iter());

            let parent_interval = self.get_interval(parent)?;
            if parent_interval.is_empty() {
                return Err(TestError::EmptyInterval(parent, parent_interval));
            }

            // Verify parent-child strict relation
            for child in children.iter().cloned() {
                let child_interval = self.get_interval(child)?;
                if !parent_interval.strictly_contains(child_interval) {
                    return Err(TestError::IntervalOutOfParentBounds { parent, child, parent_interval, child_interval });
                }
            }

            // Iterate over consecutive siblings
            for siblings in children.windows(2) {
                let sibling_interval = self.get_interval(siblings[0])?;
                let current_interval = self.get_interval(siblings[1])?;
                if sibling_interval.end >= current_interval.start {
                    return Err(TestError::NonConsecutiveSiblingIntervals(sibling_interval, current_interval));
                }
            }

            // Assert the future covering set is ordered correctly
            let future_covering_set = self.get_future_covering_set(parent)?;
            for neighbors in future_covering_set.windows(2) {
                let left_interval = self.get_interval(neighbors[0])?;
                let right_interval = self.get_interval(neighbors[1])?;
                if left_interval.end >= right_interval.start {
                    return Err(TestError::NonOrderedFutureCoveringItems(left_interval, right_interval));
                }
            }
        }
        Ok(())
    }
}

/// Returns the inclusive DAG past of `hash` over the given parents map,
/// built by explicit BFS so it can serve as a reference for the reachability
/// oracle
pub fn inclusive_past(parents_map: &BlockHashMap<Vec<Hash>>, hash: Hash) -> BlockHashSet {
    let mut queue = VecDeque::<Hash>::from([hash]);
    let mut visited: BlockHashSet = queue.iter().copied().collect();
    while let Some(current) = queue.pop_front() {
        for parent in parents_map.get(&current).cloned().unwrap_or_default() {
            if parent != ORIGIN && visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    visited
}

/// Asserts the reachability oracle over all block pairs against a reference
/// transitive closure built from explicit past traversals
pub fn validate_closure<T: ReachabilityStoreReader + ?Sized>(store: &T, parents_map: &BlockHashMap<Vec<Hash>>) {
    let hashes: Vec<Hash> = parents_map.keys().copied().collect();
    for x in hashes.iter().copied() {
        let past = inclusive_past(parents_map, x);
        for y in hashes.iter().copied() {
            assert_eq!(
                past.contains(&y),
                is_dag_ancestor_of(store, y, x).unwrap(),
                "oracle disagrees with reference: is {} an ancestor of {}",
                y,
                x
            );
        }
    }
}

#[cfg(test)]
mod test_gen {
    use super::*;
    use crate::model::stores::reachability::MemoryReachabilityStore;
    use rand::{seq::SliceRandom, Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Generates a random DAG with the given attack-free structure and
    /// asserts the oracle against the explicit closure after every insertion
    /// batch, including through reindex operations (small reindex params)
    #[test]
    fn test_random_dags_against_closure() {
        let mut rng = ChaCha8Rng::seed_from_u64(2202);
        for _ in 0..4 {
            let mut store = MemoryReachabilityStore::new();
            let mut builder = DagBuilder::new(&mut store);
            builder.init();

            let mut blocks = vec![Hash::from_u64_word(1)];
            builder.add_block(DagBlock::new(blocks[0], vec![ORIGIN]));

            let mut parents_map = BlockHashMap::new();
            parents_map.insert(blocks[0], vec![]);

            for i in 2u64..60 {
                let hash = Hash::from_u64_word(i);
                let num_parents = rng.gen_range(1..=3.min(blocks.len()));
                let parents: Vec<Hash> = blocks.choose_multiple(&mut rng, num_parents).copied().collect();
                builder.add_block(DagBlock::new(hash, parents.clone()));
                parents_map.insert(hash, parents);
                blocks.push(hash);
            }

            store.validate_intervals(ORIGIN).unwrap();
            validate_closure(&store, &parents_map);
        }
    }
}
