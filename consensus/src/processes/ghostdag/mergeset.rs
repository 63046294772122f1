use super::protocol::GhostdagManager;
use crate::model::services::reachability::ReachabilityService;
use crate::model::stores::ghostdag::GhostdagStoreReader;
use crate::model::stores::headers::HeaderStoreReader;
use crate::model::stores::relations::RelationsStoreReader;
use kyanite_consensus_core::BlockHashSet;
use kyanite_hashes::Hash;
use std::collections::VecDeque;

impl<T: GhostdagStoreReader, S: RelationsStoreReader, U: ReachabilityService, V: HeaderStoreReader> GhostdagManager<T, S, U, V> {
    /// Computes the merge set of a block with the given selected parent and
    /// parents: a BFS from the non-selected parents walking the DAG down,
    /// stopping at blocks in the past of the selected parent
    pub fn unordered_mergeset_without_selected_parent(&self, selected_parent: Hash, parents: &[Hash]) -> BlockHashSet {
        let mut queue: VecDeque<_> = parents.iter().copied().filter(|p| p != &selected_parent).collect();
        let mut mergeset: BlockHashSet = queue.iter().copied().collect();
        let mut selected_parent_past = BlockHashSet::new();

        while let Some(current) = queue.pop_front() {
            let current_parents = self.relations_store.get_parents(current).unwrap();

            // For each parent of the current block we check whether it is in
            // the past of the selected parent. If not, we add it to the
            // resulting merge set and queue it for further processing.
            for parent in current_parents.iter() {
                if mergeset.contains(parent) || selected_parent_past.contains(parent) {
                    continue;
                }

                if self.reachability_service.is_dag_ancestor_of(*parent, selected_parent) {
                    selected_parent_past.insert(*parent);
                    continue;
                }

                mergeset.insert(*parent);
                queue.push_back(*parent);
            }
        }

        mergeset
    }
}
