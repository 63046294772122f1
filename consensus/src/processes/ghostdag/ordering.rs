use kyanite_consensus_core::BlueWorkType;
use kyanite_hashes::Hash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A block as an element of the canonical consensus ordering: blocks are
/// compared by blue work with the hash as a tie-breaker. This ordering is
/// used anywhere a deterministic total order over blocks is required.
#[derive(Eq, Clone, Debug, Serialize, Deserialize)]
pub struct SortableBlock {
    pub hash: Hash,
    pub blue_work: BlueWorkType,
}

impl SortableBlock {
    pub fn new(hash: Hash, blue_work: BlueWorkType) -> Self {
        Self { hash, blue_work }
    }
}

impl PartialEq for SortableBlock {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl PartialOrd for SortableBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.blue_work.cmp(&other.blue_work).then_with(|| self.hash.cmp(&other.hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sortable_block_ordering() {
        let a = SortableBlock::new(1.into(), 5u64.into());
        let b = SortableBlock::new(2.into(), 5u64.into());
        let c = SortableBlock::new(1.into(), 6u64.into());

        // Blue work dominates, hash breaks ties
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);

        let mut blocks = vec![c.clone(), a.clone(), b.clone()];
        blocks.sort();
        assert_eq!(blocks, vec![a, b, c]);
    }
}
