use super::{extensions::ReachabilityStoreIntervalExtensions, interval::Interval, reindex::ReindexOperationContext, *};
use crate::constants::perf;
use crate::model::stores::reachability::{ReachabilityStore, ReachabilityStoreReader};
use kyanite_consensus_core::blockhash::{self, BlockHashExtensions};
use kyanite_hashes::Hash;

/// Initializes the reachability store to match the state required by the
/// algorithmic layer: the origin sentinel is set as a tree root with maximal
/// allocation capacity.
pub fn init(store: &mut (impl ReachabilityStore + ?Sized)) -> Result<()> {
    init_with_params(store, blockhash::ORIGIN, Interval::maximal())
}

pub fn init_with_params(store: &mut (impl ReachabilityStore + ?Sized), origin: Hash, capacity: Interval) -> Result<()> {
    if store.has(origin)? {
        return Ok(());
    }
    store.init(origin, capacity)?;
    Ok(())
}

/// Adds `new_block` to the reachability index. The new block is expected to
/// be attached to the tree under its `selected_parent`, and `mergeset` is
/// expected to contain its full merge set (excluding the selected parent).
pub fn add_block(
    store: &mut (impl ReachabilityStore + ?Sized),
    new_block: Hash,
    selected_parent: Hash,
    mergeset_iterator: &mut impl Iterator<Item = Hash>,
) -> Result<()> {
    add_block_with_params(store, new_block, selected_parent, mergeset_iterator, perf::DEFAULT_REINDEX_DEPTH, perf::DEFAULT_REINDEX_SLACK)
}

pub(super) fn add_block_with_params(
    store: &mut (impl ReachabilityStore + ?Sized),
    new_block: Hash,
    selected_parent: Hash,
    mergeset_iterator: &mut impl Iterator<Item = Hash>,
    reindex_depth: u64,
    reindex_slack: u64,
) -> Result<()> {
    add_tree_child(store, selected_parent, new_block, reindex_depth, reindex_slack)?;

    // Update the future covering set for blocks in the mergeset
    for merged_block in mergeset_iterator {
        insert_to_future_covering_set(store, merged_block, new_block)?;
    }

    Ok(())
}

/// Attaches `new_block` under `parent` in the reachability tree, granting it
/// half of the parent's remaining allocation capacity. An exhausted parent
/// triggers an interval reindex around the current reindex root.
pub(super) fn add_tree_child(
    store: &mut (impl ReachabilityStore + ?Sized),
    parent: Hash,
    new_block: Hash,
    reindex_depth: u64,
    reindex_slack: u64,
) -> Result<()> {
    // Capacity must be probed before the child is registered, since the
    // probe relies on the interval of the last registered child
    let remaining = store.interval_remaining_after(parent)?;
    let height = store.append_child(parent, new_block)? + 1;

    if !remaining.is_empty() {
        store.insert(new_block, parent, remaining.split_half().0, height)?;
        return Ok(());
    }

    // The parent's capacity is exhausted. The new leaf is inserted with the
    // empty interval located exactly at the end of the allocation range (the
    // reindex below relies on this exact position), and intervals are then
    // reallocated around the reindex root.
    store.insert(new_block, parent, remaining, height)?;
    let reindex_root = store.get_reindex_root()?;
    ReindexOperationContext::new(store, reindex_depth, reindex_slack).reindex_intervals(new_block, reindex_root)
}

/// Hints to the reachability algorithm that `hint` is a candidate to become
/// the `virtual selected parent`. This might move the reindex point
/// (affecting the performance of future reindex operations, never
/// correctness).
pub fn hint_virtual_selected_parent(store: &mut (impl ReachabilityStore + ?Sized), hint: Hash) -> Result<()> {
    try_advancing_reindex_root(store, hint, perf::DEFAULT_REINDEX_DEPTH, perf::DEFAULT_REINDEX_SLACK)
}

/// Attempts to move the reindex root closer to the provided selected-tip
/// hint, concentrating the interval allocation capacity along the way
pub(super) fn try_advancing_reindex_root(
    store: &mut (impl ReachabilityStore + ?Sized),
    hint: Hash,
    reindex_depth: u64,
    reindex_slack: u64,
) -> Result<()> {
    // Sentinel hints carry no chain information
    if hint.is_none() || hint.is_origin() {
        return Ok(());
    }
    ReindexOperationContext::new(store, reindex_depth, reindex_slack).advance_reindex_root(hint)
}

/// Checks if the `this` block is a strict chain ancestor of the `queried`
/// block (aka `this ∈ chain(queried)`). Note that this results in `false`
/// if `this == queried`.
pub fn is_strict_chain_ancestor_of(store: &(impl ReachabilityStoreReader + ?Sized), this: Hash, queried: Hash) -> Result<bool> {
    Ok(store.get_interval(this)?.strictly_contains(store.get_interval(queried)?))
}

/// Checks if `this` block is a chain ancestor of `queried` block (aka
/// `this ∈ chain(queried) ∪ {queried}`). Note that this results in `true`
/// if `this == queried`.
pub fn is_chain_ancestor_of(store: &(impl ReachabilityStoreReader + ?Sized), this: Hash, queried: Hash) -> Result<bool> {
    Ok(store.get_interval(this)?.contains(store.get_interval(queried)?))
}

/// Returns true if `this` is a DAG ancestor of `queried` (aka
/// `queried ∈ future(this) ∪ {this}`). Note: this method will return true if
/// `this == queried`. The complexity of this method is O(log(|future_covering_set(this)|))
pub fn is_dag_ancestor_of(store: &(impl ReachabilityStoreReader + ?Sized), this: Hash, queried: Hash) -> Result<bool> {
    // First, check if `this` is a chain ancestor of queried
    if is_chain_ancestor_of(store, this, queried)? {
        return Ok(true);
    }
    // Otherwise, use previously registered future blocks to complete the
    // DAG reachability test
    match binary_search_descendant(store, store.get_future_covering_set(this)?.as_slice(), queried)? {
        SearchOutput::Found(_, _) => Ok(true),
        SearchOutput::NotFound(_) => Ok(false),
    }
}

/// Finds the tree child of `ancestor` which is also a chain ancestor of `descendant`.
/// The function returns an error if `ancestor` is not a strict chain ancestor of `descendant`.
pub fn get_next_chain_ancestor(store: &(impl ReachabilityStoreReader + ?Sized), descendant: Hash, ancestor: Hash) -> Result<Hash> {
    if descendant == ancestor {
        // The next ancestor does not exist
        return Err(ReachabilityError::BadQuery);
    }
    if !is_strict_chain_ancestor_of(store, ancestor, descendant)? {
        // `ancestor` isn't actually a chain ancestor of `descendant`, so by
        // definition there is no next ancestor as well
        return Err(ReachabilityError::BadQuery);
    }
    get_next_chain_ancestor_unchecked(store, descendant, ancestor)
}

/// Note: it is the caller's responsibility to make sure that `ancestor` is a
/// strict chain ancestor of `descendant`; otherwise the function will return
/// a data-inconsistency error
pub(super) fn get_next_chain_ancestor_unchecked(
    store: &(impl ReachabilityStoreReader + ?Sized),
    descendant: Hash,
    ancestor: Hash,
) -> Result<Hash> {
    match binary_search_descendant(store, store.get_children(ancestor)?.as_slice(), descendant)? {
        SearchOutput::Found(hash, _) => Ok(hash),
        SearchOutput::NotFound(_) => Err(ReachabilityError::DataInconsistency(format!(
            "no child of {} contains the interval of {}",
            ancestor, descendant
        ))),
    }
}

enum SearchOutput {
    NotFound(usize), // `usize` is the position to insert at
    Found(Hash, usize),
}

/// Searches the ordered-by-interval list for a block which is a chain
/// ancestor of `descendant`. The list is assumed to be sorted and disjoint
/// interval-wise, hence a binary search can be applied.
fn binary_search_descendant(
    store: &(impl ReachabilityStoreReader + ?Sized),
    ordered_hashes: &[Hash],
    descendant: Hash,
) -> Result<SearchOutput> {
    if cfg!(debug_assertions) {
        // This is a linearly expensive assertion, keep it debug only
        assert_hashes_ordered(store, ordered_hashes);
    }

    let descendant_interval = store.get_interval(descendant)?;
    let mut low = 0usize;
    let mut high = ordered_hashes.len();
    while low < high {
        let mid = (low + high) / 2;
        let candidate_interval = store.get_interval(ordered_hashes[mid])?;
        if candidate_interval.contains(descendant_interval) {
            return Ok(SearchOutput::Found(ordered_hashes[mid], mid));
        }
        if candidate_interval.end < descendant_interval.start {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    Ok(SearchOutput::NotFound(low))
}

fn assert_hashes_ordered(store: &(impl ReachabilityStoreReader + ?Sized), ordered_hashes: &[Hash]) {
    let intervals: Vec<Interval> = ordered_hashes.iter().cloned().map(|c| store.get_interval(c).unwrap()).collect();
    debug_assert!(intervals.as_slice().windows(2).all(|w| w[0].end < w[1].start))
}

/// Inserts `new_block` into the future covering set of `merged_block`
fn insert_to_future_covering_set(
    store: &mut (impl ReachabilityStore + ?Sized),
    merged_block: Hash,
    new_block: Hash,
) -> Result<()> {
    match binary_search_descendant(store, store.get_future_covering_set(merged_block)?.as_slice(), new_block)? {
        // The new block is already covered by a previously inserted future
        // block, hence nothing to update
        SearchOutput::Found(_, _) => Ok(()),
        SearchOutput::NotFound(i) => {
            store.insert_future_covering_item(merged_block, new_block, i)?;
            Ok(())
        }
    }
}

/// Deletes `block` from the reachability index: its tree children are
/// re-attached to its tree parent and it is replaced by its children within
/// every future covering set it was registered in (given via `mergeset`).
/// Used when pruning old data.
pub fn delete_block(
    store: &mut (impl ReachabilityStore + ?Sized),
    block: Hash,
    mergeset_iterator: &mut impl Iterator<Item = Hash>,
) -> Result<()> {
    let parent = store.get_parent(block)?;
    let children = store.get_children(block)?;

    // Replace the block with its children within the parent's children list
    store.replace_child(parent, block, &children)?;
    for child in children.iter().copied() {
        store.set_parent(child, parent)?;
    }

    // Replace the block with its children within the future covering sets of
    // its mergeset. Children intervals are contained in the block's interval
    // so the ordering of each set is preserved.
    for merged_block in mergeset_iterator {
        if !store.has(merged_block)? {
            continue;
        }
        store.replace_future_covering_item(merged_block, block, &children)?;
    }

    store.delete(block)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{tests::*, *};
    use crate::model::stores::reachability::MemoryReachabilityStore;

    #[test]
    fn test_add_tree_blocks() {
        // Arrange
        let mut store = MemoryReachabilityStore::new();
        // Act
        let root: Hash = 1.into();
        TreeBuilder::new(&mut store)
            .init_with_params(root, Interval::new(1, 15))
            .add_block(2.into(), root)
            .add_block(3.into(), 2.into())
            .add_block(4.into(), 2.into())
            .add_block(5.into(), 3.into())
            .add_block(6.into(), 5.into())
            .add_block(7.into(), 1.into())
            .add_block(8.into(), 6.into())
            .add_block(9.into(), 6.into())
            .add_block(10.into(), 6.into())
            .add_block(11.into(), 6.into());
        // Assert
        store.validate_intervals(root).unwrap();
    }

    #[test]
    fn test_add_early_blocks() {
        // Arrange
        let mut store = MemoryReachabilityStore::new();

        // Act
        let root: Hash = Hash::from_u64_word(1);
        let mut builder = TreeBuilder::new_with_params(&mut store, 2, 5);
        builder.init_with_params(root, Interval::maximal());
        for i in 2u64..100 {
            let hash = Hash::from_u64_word(i);
            builder.add_block(hash, Hash::from_u64_word(i / 2));
        }

        // Should trigger an earlier than reindex root allocation
        builder.add_block(Hash::from_u64_word(100), Hash::from_u64_word(2));
        store.validate_intervals(root).unwrap();
    }

    #[test]
    fn test_add_dag_blocks() {
        // Arrange
        let mut store = MemoryReachabilityStore::new();
        let origin_hash = Hash::from_u64_word(1);
        // Act
        DagBuilder::new(&mut store)
            .init()
            .add_block(DagBlock::new(origin_hash, vec![blockhash::ORIGIN]))
            .add_block(DagBlock::new(2.into(), vec![1.into()]))
            .add_block(DagBlock::new(3.into(), vec![1.into()]))
            .add_block(DagBlock::new(4.into(), vec![2.into(), 3.into()]))
            .add_block(DagBlock::new(5.into(), vec![4.into()]))
            .add_block(DagBlock::new(6.into(), vec![1.into()]))
            .add_block(DagBlock::new(7.into(), vec![5.into(), 6.into()]))
            .add_block(DagBlock::new(8.into(), vec![1.into()]))
            .add_block(DagBlock::new(9.into(), vec![1.into()]))
            .add_block(DagBlock::new(10.into(), vec![7.into(), 8.into(), 9.into()]))
            .add_block(DagBlock::new(11.into(), vec![1.into()]))
            .add_block(DagBlock::new(12.into(), vec![11.into(), 10.into()]));

        // Assert intervals
        store.validate_intervals(blockhash::ORIGIN).unwrap();

        // Assert genesis
        for i in 2u64..=12 {
            assert!(store.in_past_of(1, i));
        }

        // Assert some futures
        assert!(store.in_past_of(2, 4));
        assert!(store.in_past_of(2, 5));
        assert!(store.in_past_of(2, 7));
        assert!(store.in_past_of(5, 10));
        assert!(store.in_past_of(6, 10));
        assert!(store.in_past_of(10, 12));
        assert!(store.in_past_of(11, 12));

        // Assert some anticones
        assert!(store.are_anticone(2, 3));
        assert!(store.are_anticone(2, 6));
        assert!(store.are_anticone(3, 6));
        assert!(store.are_anticone(5, 6));
        assert!(store.are_anticone(3, 8));
        assert!(store.are_anticone(11, 2));
        assert!(store.are_anticone(11, 4));
        assert!(store.are_anticone(11, 6));
        assert!(store.are_anticone(11, 9));
    }

    #[test]
    fn test_delete_block() {
        // Arrange
        let mut store = MemoryReachabilityStore::new();
        DagBuilder::new(&mut store)
            .init()
            .add_block(DagBlock::new(1.into(), vec![blockhash::ORIGIN]))
            .add_block(DagBlock::new(2.into(), vec![1.into()]))
            .add_block(DagBlock::new(3.into(), vec![1.into()]))
            .add_block(DagBlock::new(4.into(), vec![2.into(), 3.into()]))
            .add_block(DagBlock::new(5.into(), vec![4.into()]));

        // Act: delete the non-chain block 3 (mergeset of nobody remaining except 4's FCS registration)
        delete_block(&mut store, 1.into(), &mut std::iter::empty()).unwrap();

        // Assert
        assert!(!store.has(1.into()).unwrap());
        store.validate_intervals(blockhash::ORIGIN).unwrap();
        assert!(store.in_past_of(2, 4));
        assert!(store.in_past_of(3, 5));
        assert!(store.are_anticone(2, 3));
    }
}
