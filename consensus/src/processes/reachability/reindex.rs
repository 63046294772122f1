use std::collections::VecDeque;

use super::{
    extensions::ReachabilityStoreIntervalExtensions,
    inquirer::{get_next_chain_ancestor_unchecked, is_chain_ancestor_of},
    *,
};
use crate::model::stores::reachability::ReachabilityStore;
use kyanite_consensus_core::{blockhash::BlockHashExtensions, BlockHashMap, HashMapCustomHasher};
use kyanite_hashes::Hash;

/// A struct used during reindex operations. It represents a temporary context
/// for caching subtree information during the *current* reindex operation only
pub(super) struct ReindexOperationContext<'a, T: ReachabilityStore + ?Sized> {
    store: &'a mut T,
    subtree_sizes: BlockHashMap<u64>, // Cache for subtree sizes computed during this operation
    depth: u64,
    slack: u64,
}

impl<'a, T: ReachabilityStore + ?Sized> ReindexOperationContext<'a, T> {
    pub(super) fn new(store: &'a mut T, depth: u64, slack: u64) -> Self {
        Self { store, subtree_sizes: BlockHashMap::new(), depth, slack }
    }

    /// Traverses the reachability subtree that's defined by the new child
    /// block and reallocates reachability interval space
    /// such that another reindexing is unlikely to occur shortly
    /// thereafter. It does this by traversing down the reachability
    /// tree until it finds a block with an interval size that's greater than
    /// the subtree size. See `propagate_interval` for further details.
    pub(super) fn reindex_intervals(&mut self, new_child: Hash, _reindex_root: Hash) -> Result<()> {
        let mut current = new_child;

        // Search for the first ancestor with sufficient interval space
        loop {
            let current_interval = self.store.get_interval(current)?;
            self.count_subtrees(current)?;

            if current_interval.size() >= self.subtree_sizes[&current] {
                break;
            }

            let parent = self.store.get_parent(current)?;

            if parent.is_none() {
                // If we ended up here it means that there are more
                // than 2^64 blocks, which shouldn't ever happen
                return Err(ReachabilityError::DataOverflow(
                    "missing tree parent during reindexing. Theoretically, this
                     should only ever happen if there are more than 2^64 blocks in the DAG."
                        .to_string(),
                ));
            }

            current = parent
        }

        self.propagate_interval(current)
    }

    ///
    /// Core (BFS) algorithms used during reindexing (see `count_subtrees` and `propagate_interval` below)
    ///

    /// count_subtrees counts the size of each subtree under this block,
    /// and populates self.subtree_sizes with the results.
    /// It is equivalent to the following recursive implementation:
    ///
    /// ```ignore
    /// fn count_subtrees(&mut self, block: Hash) -> Result<u64> {
    ///     let mut subtree_size = 0u64;
    ///     for child in self.store.get_children(block)?.iter().cloned() {
    ///         subtree_size += self.count_subtrees(child)?;
    ///     }
    ///     self.subtree_sizes.insert(block, subtree_size + 1);
    ///     Ok(subtree_size + 1)
    /// }
    /// ```
    ///
    /// However, we are expecting (linearly) deep trees, and so a
    /// recursive stack-based approach is inefficient and will hit
    /// recursion limits. Instead, the same logic was implemented
    /// using a (queue-based) BFS method. At a high level, the
    /// algorithm uses BFS for reaching all leaves and pushes
    /// intermediate updates from leaves via parent chains until all
    /// size information is gathered at the root of the operation
    /// (i.e. at block).
    fn count_subtrees(&mut self, block: Hash) -> Result<()> {
        if self.subtree_sizes.contains_key(&block) {
            return Ok(());
        }

        let mut queue = VecDeque::<Hash>::from([block]);
        let mut counts = BlockHashMap::<u64>::new();

        while let Some(mut current) = queue.pop_front() {
            let children = self.store.get_children(current)?;
            if children.is_empty() {
                // We reached a leaf
                self.subtree_sizes.insert(current, 1);
            } else if !self.subtree_sizes.contains_key(&current) {
                // We haven't yet calculated the subtree size of
                // the current block. Add all its children to the
                // queue
                queue.extend(children.iter());
                continue;
            }

            // We reached a leaf or a pre-calculated subtree.
            // Push information up
            while current != block {
                current = self.store.get_parent(current)?;

                let count = counts.entry(current).or_insert(0);
                let children = self.store.get_children(current)?;

                *count += 1;
                if *count < children.len() as u64 {
                    // Not all subtrees of the current block are ready
                    break;
                }

                // All children of `current` have calculated their subtree size.
                // Sum them all together and add 1 to get the sub tree size of
                // `current`.
                let subtree_sum: u64 = children.iter().map(|c| self.subtree_sizes[c]).sum();
                self.subtree_sizes.insert(current, subtree_sum + 1);
            }
        }

        Ok(())
    }

    /// Propagates a new interval using a BFS traversal.
    /// Subtree intervals are recursively allocated according to subtree sizes and
    /// the allocation rule in `Interval::split_exponential`.
    fn propagate_interval(&mut self, block: Hash) -> Result<()> {
        // Make sure subtrees are counted before propagating
        self.count_subtrees(block)?;

        let mut queue = VecDeque::<Hash>::from([block]);
        while let Some(current) = queue.pop_front() {
            let children = self.store.get_children(current)?;
            if !children.is_empty() {
                let sizes: Vec<u64> = children.iter().map(|c| self.subtree_sizes[c]).collect();
                let interval = self.store.interval_children_capacity(current)?;
                let intervals = interval.split_exponential(&sizes);
                for (c, ci) in children.iter().copied().zip(intervals) {
                    self.store.set_interval(c, ci)?;
                }
                queue.extend(children.iter());
            }
        }
        Ok(())
    }

    /// Concentrates the available capacity of `ancestor` towards
    /// `chosen_child` (the child on the path to the new reindex root):
    /// all other children are tightened to their subtree size (plus slack)
    /// while the chosen child is expanded over the remaining space. The
    /// chosen child's new interval is guaranteed to contain its current one,
    /// so only the sibling subtrees require interval propagation.
    pub(super) fn concentrate_interval(&mut self, ancestor: Hash, chosen_child: Hash) -> Result<()> {
        let children = self.store.get_children(ancestor)?;
        let chosen_index = children
            .iter()
            .position(|&h| h == chosen_child)
            .ok_or_else(|| ReachabilityError::DataInconsistency(format!("{} is not a child of {}", chosen_child, ancestor)))?;

        let capacity = self.store.interval_children_capacity(ancestor)?;
        let chosen_interval = self.store.get_interval(chosen_child)?;

        for sibling in children.iter().copied().filter(|&h| h != chosen_child) {
            self.count_subtrees(sibling)?;
        }

        // Pack the siblings before the chosen child tightly at the start of
        // the capacity. Note that each sibling currently holds an interval at
        // least as large as its subtree, so exact sizes are always feasible;
        // slack is granted only while it fits before the chosen child.
        let before_sizes = self.sibling_sizes(&children[..chosen_index], chosen_interval.start - capacity.start);
        let mut start = capacity.start;
        for (sibling, size) in children[..chosen_index].iter().copied().zip(before_sizes.iter().copied()) {
            self.store.set_interval(sibling, interval::Interval::new(start, start + size - 1))?;
            self.propagate_interval(sibling)?;
            start += size;
        }
        let left_used: u64 = before_sizes.iter().sum();

        // Symmetrically pack the siblings after the chosen child at the end
        let after_sizes = self.sibling_sizes(&children[chosen_index + 1..], capacity.end - chosen_interval.end);
        let mut end = capacity.end;
        for (sibling, size) in children[chosen_index + 1..].iter().copied().zip(after_sizes.iter().copied()).rev() {
            self.store.set_interval(sibling, interval::Interval::new(end - size + 1, end))?;
            self.propagate_interval(sibling)?;
            end -= size;
        }
        let right_used: u64 = after_sizes.iter().sum();

        // The chosen child expands over all the remaining capacity. Its
        // current interval is contained in the new one, hence its subtree
        // remains untouched.
        let expanded = interval::Interval::new(capacity.start + left_used, capacity.end - right_used);
        debug_assert!(expanded.contains(chosen_interval));
        self.store.set_interval(chosen_child, expanded)?;

        Ok(())
    }

    /// Moves the reindex root towards the given selected-tip hint, one chain
    /// step at a time, concentrating the interval capacity at every step
    pub(super) fn advance_reindex_root(&mut self, hint: Hash) -> Result<()> {
        let current_root = self.store.get_reindex_root()?;
        let (mut ancestor, target_root) = self.next_reindex_root(current_root, hint)?;

        while ancestor != target_root {
            let chosen_child = get_next_chain_ancestor_unchecked(self.store, target_root, ancestor)?;
            self.concentrate_interval(ancestor, chosen_child)?;
            ancestor = chosen_child;
        }

        if target_root != current_root {
            self.store.set_reindex_root(target_root)?;
        }
        Ok(())
    }

    /// Computes the next reindex root based on the current root and the
    /// selected-tip `hint`: the block to start concentrating from along with
    /// the new root itself. The root only advances once the hint is at least
    /// `depth` above a candidate, and only switches branches (a reorg of the
    /// root) once the height gap crosses the `slack` threshold, so that
    /// alternating-reorg attacks cannot force repeated concentrations.
    fn next_reindex_root(&self, current_root: Hash, hint: Hash) -> Result<(Hash, Hash)> {
        let hint_height = self.store.get_height(hint)?;

        let start = if is_chain_ancestor_of(self.store, current_root, hint)? {
            current_root
        } else {
            // The hint reorgs the current root. Note the hint can also be
            // lower than the root, in which case the subtraction saturates
            // and the root is surely kept in place.
            let current_height = self.store.get_height(current_root)?;
            if hint_height.saturating_sub(current_height) < self.slack {
                return Ok((current_root, current_root));
            }
            self.common_chain_ancestor(hint, current_root)?
        };

        // Push the root up the hint's chain for as long as it remains at
        // least `depth` below the hint
        let mut next = start;
        while next != hint {
            let child = get_next_chain_ancestor_unchecked(self.store, hint, next)?;
            let child_height = self.store.get_height(child)?;
            if child_height > hint_height {
                return Err(ReachabilityError::DataInconsistency(format!(
                    "chain ancestor {} is higher than its descendant {}",
                    child, hint
                )));
            }
            if hint_height - child_height < self.depth {
                break;
            }
            next = child;
        }

        Ok((start, next))
    }

    /// The most recent tree ancestor shared by `block` and the given root.
    /// We walk up from `block` since the chain from the root is usually the
    /// longer one.
    fn common_chain_ancestor(&self, block: Hash, root: Hash) -> Result<Hash> {
        let mut current = block;
        while !is_chain_ancestor_of(self.store, current, root)? {
            current = self.store.get_parent(current)?;
        }
        Ok(current)
    }

    /// Allocation sizes for a run of siblings: each gets its exact subtree
    /// size, with `slack` added while the overall budget allows it
    fn sibling_sizes(&self, siblings: &[Hash], budget: u64) -> Vec<u64> {
        let exact: Vec<u64> = siblings.iter().map(|s| self.subtree_sizes[s]).collect();
        let exact_sum: u64 = exact.iter().sum();
        debug_assert!(exact_sum <= budget, "sibling intervals always cover their subtrees");
        let mut remaining_slack = budget - exact_sum;
        exact
            .into_iter()
            .map(|size| {
                let grant = remaining_slack.min(self.slack);
                remaining_slack -= grant;
                size + grant
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::{model::stores::reachability::MemoryReachabilityStore, processes::reachability::interval::Interval};

    #[test]
    fn test_count_subtrees() {
        let mut store = MemoryReachabilityStore::new();

        // Arrange
        let root: Hash = 1.into();
        StoreBuilder::new(&mut store)
            .add_block(root, Hash::default())
            .add_block(2.into(), root)
            .add_block(3.into(), 2.into())
            .add_block(4.into(), 2.into())
            .add_block(5.into(), 3.into())
            .add_block(6.into(), 5.into())
            .add_block(7.into(), 1.into())
            .add_block(8.into(), 6.into());

        // Act
        let mut ctx = ReindexOperationContext::new(&mut store, 10, 16);
        ctx.count_subtrees(root).unwrap();

        // Assert
        let expected = [(1u64, 8u64), (2, 6), (3, 4), (4, 1), (5, 3), (6, 2), (7, 1), (8, 1)]
            .iter()
            .cloned()
            .map(|(h, c)| (Hash::from(h), c))
            .collect::<BlockHashMap<u64>>();

        assert_eq!(expected, ctx.subtree_sizes);

        // Act
        ctx.store.set_interval(root, Interval::new(1, 8)).unwrap();
        ctx.propagate_interval(root).unwrap();

        // Assert intervals manually
        let expected_intervals =
            [(1u64, (1u64, 8u64)), (2, (1, 6)), (3, (1, 4)), (4, (5, 5)), (5, (1, 3)), (6, (1, 2)), (7, (7, 7)), (8, (1, 1))];
        let actual_intervals =
            (1u64..=8).map(|i| (i, store.get_interval(i.into()).unwrap().into())).collect::<Vec<(u64, (u64, u64))>>();
        assert_eq!(actual_intervals, expected_intervals);

        // Assert intervals follow the general rules
        store.validate_intervals(root).unwrap();
    }

    #[test]
    fn test_concentrate_interval() {
        let mut store = MemoryReachabilityStore::new();

        // Build a tree with a tight root capacity and verify that
        // concentration towards a chosen child preserves all invariants
        let root: Hash = 1.into();
        TreeBuilder::new_with_params(&mut store, 10, 3)
            .init_with_params(root, Interval::new(1, 1000))
            .add_block(2.into(), root)
            .add_block(3.into(), root)
            .add_block(4.into(), root)
            .add_block(5.into(), 3.into())
            .add_block(6.into(), 3.into())
            .add_block(7.into(), 5.into());

        let chosen: Hash = 3.into();
        let before = store.get_interval(chosen).unwrap();
        let mut ctx = ReindexOperationContext::new(&mut store, 10, 3);
        ctx.count_subtrees(root).unwrap();
        ctx.concentrate_interval(root, chosen).unwrap();

        let after = store.get_interval(chosen).unwrap();
        assert!(after.contains(before));
        assert!(after.size() > before.size());
        store.validate_intervals(root).unwrap();
    }
}
