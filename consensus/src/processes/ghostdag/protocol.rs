use kyanite_consensus_core::{blockhash, blockhash::BlockHashes, BlockHashMap, BlueWorkType, HashMapCustomHasher, KType};
use kyanite_hashes::Hash;
use kyanite_pow::calc_block_work;
use std::sync::Arc;

use crate::model::{
    services::reachability::ReachabilityService,
    stores::{
        ghostdag::{GhostdagData, GhostdagStoreReader, HashKTypeMap},
        headers::HeaderStoreReader,
        relations::RelationsStoreReader,
    },
};

use super::ordering::SortableBlock;

#[derive(Clone)]
pub struct GhostdagManager<T: GhostdagStoreReader, S: RelationsStoreReader, U: ReachabilityService, V: HeaderStoreReader> {
    genesis_hash: Hash,
    pub(super) k: KType,
    pub(super) ghostdag_store: Arc<T>,
    pub(super) relations_store: S,
    pub(super) headers_store: Arc<V>,
    pub(super) reachability_service: U,
}

impl<T: GhostdagStoreReader, S: RelationsStoreReader, U: ReachabilityService, V: HeaderStoreReader> GhostdagManager<T, S, U, V> {
    pub fn new(
        genesis_hash: Hash,
        k: KType,
        ghostdag_store: Arc<T>,
        relations_store: S,
        headers_store: Arc<V>,
        reachability_service: U,
    ) -> Self {
        Self { genesis_hash, k, ghostdag_store, relations_store, headers_store, reachability_service }
    }

    /// The GHOSTDAG data of genesis: an empty merge set over the origin
    /// sentinel with zero score and work
    pub fn genesis_ghostdag_data(&self) -> GhostdagData {
        GhostdagData::new(
            0,
            Default::default(),
            blockhash::ORIGIN,
            BlockHashes::new(Vec::new()),
            BlockHashes::new(Vec::new()),
            HashKTypeMap::new(BlockHashMap::new()),
        )
    }

    pub fn find_selected_parent(&self, parents: impl IntoIterator<Item = Hash>) -> Hash {
        parents
            .into_iter()
            .map(|parent| SortableBlock { hash: parent, blue_work: self.ghostdag_store.get_blue_work(parent).unwrap() })
            .max()
            .expect("expected at least one parent")
            .hash
    }

    /// Runs the GHOSTDAG protocol and calculates the block GhostdagData by the given parents.
    /// The function calculates mergeset blues by iterating over the blocks in
    /// the anticone of the new block selected parent (which is the parent with the
    /// highest blue work) and adds any block to the blue set if by adding
    /// it these conditions will not be violated:
    ///
    /// 1) |anticone-of-candidate-block ∩ blue-set-of-new-block| ≤ K
    ///
    /// 2) For every blue block in blue-set-of-new-block:
    ///    |(anticone-of-blue-block ∩ blue-set-new-block) ∪ {candidate-block}| ≤ K.
    ///    We validate this condition by maintaining a map blues_anticone_sizes for
    ///    each block which holds all the blue anticone sizes that were affected by
    ///    the new added blue blocks.
    ///
    /// This function MUST be called in the diagonal order of the DAG (a block
    /// can only be processed after all its parents were).
    ///
    /// `own_bits` is the difficulty bits of the new block itself, included in
    /// its accumulated blue work; the virtual block passes `None` since it
    /// carries no work of its own.
    pub fn ghostdag(&self, parents: &[Hash], own_bits: Option<u32>) -> GhostdagData {
        assert!(!parents.is_empty(), "genesis must be added via a call to init");

        // Run the GHOSTDAG parent selection algorithm
        let selected_parent = self.find_selected_parent(parents.iter().copied());
        // Initialize new block data with the selected parent
        let mut new_block_data = Arc::new(GhostdagData::new_with_selected_parent(selected_parent, self.k));
        // Get the mergeset in consensus-agreed topological order (topological here means forward in time from blocks to children)
        let ordered_mergeset = self.sorted_mergeset_without_selected_parent(selected_parent, parents);

        for blue_candidate in ordered_mergeset.iter().cloned() {
            let coloring = self.check_blue_candidate(&new_block_data, blue_candidate);

            if let ColoringOutput::Blue(blue_anticone_size, blues_anticone_sizes) = coloring {
                // No k-cluster violation found, we can now set the candidate block as blue
                new_block_data.add_blue(blue_candidate, blue_anticone_size, &blues_anticone_sizes);
            } else {
                new_block_data.add_red(blue_candidate);
            }
        }

        let blue_score = self.ghostdag_store.get_blue_score(selected_parent).unwrap() + new_block_data.mergeset_blues.len() as u64;

        // Accumulated work: the selected parent's blue work, plus the work of
        // the merge-set blues beyond it, plus the new block's own work
        let added_blue_work: BlueWorkType = new_block_data
            .mergeset_blues
            .iter()
            .skip(1) // The selected parent's own work is already accumulated in its blue work
            .cloned()
            .map(|hash| calc_block_work(self.headers_store.get_bits(hash).unwrap()))
            .chain(own_bits.map(calc_block_work))
            .sum();

        let blue_work = self.ghostdag_store.get_blue_work(selected_parent).unwrap() + added_blue_work;
        new_block_data.finalize_score_and_work(blue_score, blue_work);

        // The data is kept under Arc only for internal mutation ergonomics
        Arc::try_unwrap(new_block_data).unwrap_or_else(|arc| (*arc).clone())
    }

    /// Sorts the mergeset in the canonical consensus order: ascending
    /// `(blue_work, hash)`. The acceptance-data and coinbase computations
    /// must reproduce this order bit-exactly.
    pub fn sorted_mergeset_without_selected_parent(&self, selected_parent: Hash, parents: &[Hash]) -> Vec<Hash> {
        let mut sorted_blocks: Vec<SortableBlock> = self
            .unordered_mergeset_without_selected_parent(selected_parent, parents)
            .into_iter()
            .map(|block| SortableBlock { hash: block, blue_work: self.ghostdag_store.get_blue_work(block).unwrap() })
            .collect();
        sorted_blocks.sort();
        sorted_blocks.into_iter().map(|block| block.hash).collect()
    }

    /// Returns the blue anticone size of `block` from the worldview of
    /// `context`. Expects `block` to be in the blue set of `context`.
    fn blue_anticone_size(&self, block: Hash, context: &GhostdagData) -> KType {
        let mut current_blues_anticone_sizes = HashKTypeMap::clone(&context.blues_anticone_sizes);
        let mut current_selected_parent = context.selected_parent;
        loop {
            if let Some(size) = current_blues_anticone_sizes.get(&block) {
                return *size;
            }

            // The structural invariant is that any blue block of the context
            // appears in the anticone-sizes map of some chain ancestor. If it
            // does not, the data is corrupt and we must not continue.
            assert!(
                current_selected_parent != self.genesis_hash && current_selected_parent != blockhash::ORIGIN,
                "block {block} is not in blue set of the given context"
            );

            current_blues_anticone_sizes = self.ghostdag_store.get_blues_anticone_sizes(current_selected_parent).unwrap();
            current_selected_parent = self.ghostdag_store.get_selected_parent(current_selected_parent).unwrap();
        }
    }

    fn check_blue_candidate_with_chain_block(
        &self,
        new_block_data: &GhostdagData,
        chain_block: &ChainBlock,
        blue_candidate: Hash,
        candidate_blues_anticone_sizes: &mut BlockHashMap<KType>,
        candidate_blue_anticone_size: &mut KType,
    ) -> ColoringState {
        // If blue_candidate is in the future of chain_block, it means
        // that all remaining blues are in the past of chain_block and thus
        // in the past of blue_candidate. In this case we know for sure that
        // the anticone of blue_candidate will not exceed K, and we can mark
        // it as blue.
        //
        // The new block is always in the future of blue_candidate, so there's
        // no point in checking it.

        // We check if chain_block is not the new block by checking if it has a hash.
        if let Some(hash) = chain_block.hash {
            if self.reachability_service.is_dag_ancestor_of(hash, blue_candidate) {
                return ColoringState::Blue;
            }
        }

        for &block in chain_block.data.mergeset_blues.iter() {
            // Skip blocks that exist in the past of blue_candidate.
            if self.reachability_service.is_dag_ancestor_of(block, blue_candidate) {
                continue;
            }

            candidate_blues_anticone_sizes.insert(block, self.blue_anticone_size(block, new_block_data));

            *candidate_blue_anticone_size += 1;
            if *candidate_blue_anticone_size > self.k {
                // k-cluster violation: the candidate's blue anticone exceeded k
                return ColoringState::Red;
            }

            if *candidate_blues_anticone_sizes.get(&block).unwrap() == self.k {
                // k-cluster violation: a block in candidate's blue anticone already
                // has k blue blocks in its own anticone
                return ColoringState::Red;
            }

            // This is a sanity check that validates that a blue
            // block's blue anticone is not already larger than K.
            assert!(
                *candidate_blues_anticone_sizes.get(&block).unwrap() <= self.k,
                "found blue anticone larger than K"
            );
        }

        ColoringState::Pending
    }

    /// Checks whether the given candidate is blue in the worldview of the new
    /// block. The function walks down the selected chain of the new block,
    /// inspecting the blue-set windows of each chain block, until the verdict
    /// is determined.
    fn check_blue_candidate(&self, new_block_data: &Arc<GhostdagData>, blue_candidate: Hash) -> ColoringOutput {
        // The maximum length of new_block_data.mergeset_blues can be K+1 because
        // it contains the selected parent.
        if new_block_data.mergeset_blues.len() as u64 == self.k as u64 + 1 {
            return ColoringOutput::Red;
        }

        let mut candidate_blues_anticone_sizes: BlockHashMap<KType> = BlockHashMap::with_capacity(self.k as usize);
        // Iterate over all blocks in the blue past of the new block that are not in the past
        // of blue_candidate, and check for each one of them if blue_candidate potentially
        // enlarges their blue anticone to be over K, or that they enlarge the blue anticone
        // of blue_candidate to be over K.
        let mut chain_block = ChainBlock { hash: None, data: new_block_data.clone() };
        let mut candidate_blue_anticone_size: KType = 0;

        loop {
            let state = self.check_blue_candidate_with_chain_block(
                new_block_data,
                &chain_block,
                blue_candidate,
                &mut candidate_blues_anticone_sizes,
                &mut candidate_blue_anticone_size,
            );

            match state {
                ColoringState::Blue => return ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes),
                ColoringState::Red => return ColoringOutput::Red,
                ColoringState::Pending => {
                    let next_chain_block = chain_block.data.selected_parent;
                    if next_chain_block == blockhash::ORIGIN {
                        // Reached the bottom of the currently known chain:
                        // all relevant blues were inspected
                        return ColoringOutput::Blue(candidate_blue_anticone_size, candidate_blues_anticone_sizes);
                    }
                    chain_block =
                        ChainBlock { hash: Some(next_chain_block), data: self.ghostdag_store.get_data(next_chain_block).unwrap() }
                }
            }
        }
    }
}

/// Chain block with attached ghostdag data
struct ChainBlock {
    hash: Option<Hash>, // If this is `None`, it means this chain block is the new block
    data: Arc<GhostdagData>,
}

/// Represents the intermediate GHOSTDAG coloring state for the current
/// candidate
enum ColoringState {
    Blue,
    Red,
    Pending,
}

/// Represents the final output of GHOSTDAG coloring for the current candidate
enum ColoringOutput {
    /// Including the candidate's blue anticone size and the blues anticone sizes
    Blue(KType, BlockHashMap<KType>),
    Red,
}
