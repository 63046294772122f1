use crate::model::stores::{
    ghostdag::{GhostdagData, GhostdagStoreReader},
    headers::HeaderStoreReader,
};
use crate::processes::traversal_manager::BlockWindowHeap;
use itertools::Itertools;
use kyanite_consensus_core::{BlockHashSet, HashMapCustomHasher};
use kyanite_math::{Uint256, Uint320};
use kyanite_pow::{big_to_compact, compact_to_big};
use std::{
    cmp::{max, Ordering},
    sync::Arc,
};

use super::ghostdag::ordering::SortableBlock;

/// The difficulty-adjustment manager. Also owns the DAA-score bookkeeping
/// since both are derived from the same blue window.
#[derive(Clone)]
pub struct DifficultyManager<T: HeaderStoreReader> {
    headers_store: Arc<T>,
    genesis_bits: u32,
    max_difficulty_target: Uint256,
    difficulty_window_size: usize,
    min_difficulty_window_size: usize,
    target_time_per_block: u64,
}

impl<T: HeaderStoreReader> DifficultyManager<T> {
    pub fn new(
        headers_store: Arc<T>,
        genesis_bits: u32,
        max_difficulty_target: Uint256,
        difficulty_window_size: usize,
        min_difficulty_window_size: usize,
        target_time_per_block: u64,
    ) -> Self {
        assert!(min_difficulty_window_size <= difficulty_window_size);
        Self {
            headers_store,
            genesis_bits,
            max_difficulty_target,
            difficulty_window_size,
            min_difficulty_window_size,
            target_time_per_block,
        }
    }

    /// The lowest blue score a merge-set block may have while still being
    /// part of the difficulty window of the block with the given data
    pub fn lowest_daa_blue_score(&self, ghostdag_data: &GhostdagData) -> u64 {
        let window_size = self.difficulty_window_size as u64;
        ghostdag_data.blue_score.max(window_size) - window_size
    }

    /// Calculates the DAA score of a block and the subset of its merge set
    /// which falls below the difficulty window (and hence is excluded from
    /// the score and from coinbase rewards)
    pub fn calc_daa_score_and_mergeset_non_daa_blocks(
        &self,
        ghostdag_data: &GhostdagData,
        store: &(impl GhostdagStoreReader + ?Sized),
        selected_parent_daa_score: u64,
    ) -> (u64, BlockHashSet) {
        let lowest_daa_blue_score = self.lowest_daa_blue_score(ghostdag_data);
        let mergeset_non_daa: BlockHashSet = ghostdag_data
            .unordered_mergeset()
            .filter(|hash| match store.get_blue_score(*hash) {
                Ok(blue_score) => blue_score < lowest_daa_blue_score,
                Err(_) => true, // Pruned blocks are treated as out of the window
            })
            .collect();
        let daa_score = selected_parent_daa_score + (ghostdag_data.mergeset_size() - mergeset_non_daa.len()) as u64;
        (daa_score, mergeset_non_daa)
    }

    /// Computes the expected difficulty bits for a block whose blue window is
    /// `window`: the average window target scaled by the ratio between the
    /// window's actual timestamp span and its expected span, clamped by the
    /// maximal target. Until the window is sufficiently populated the genesis
    /// difficulty is kept.
    pub fn calculate_difficulty_bits(&self, window: &BlockWindowHeap) -> u32 {
        let mut difficulty_blocks = self.get_difficulty_blocks(window);

        // Until there are enough blocks for a valid calculation the difficulty should remain constant.
        // A window of less than two blocks has no timestamp span to normalize by.
        if difficulty_blocks.len() < self.min_difficulty_window_size.max(2) {
            return self.genesis_bits;
        }

        let (min_ts_index, max_ts_index) = difficulty_blocks.iter().position_minmax().into_option().unwrap();

        let min_ts = difficulty_blocks[min_ts_index].timestamp;
        let max_ts = difficulty_blocks[max_ts_index].timestamp;

        // We remove the min-timestamp block because we want the average target for the internal window
        difficulty_blocks.swap_remove(min_ts_index);

        // An average of the whole window targets with Uint320 headroom
        // against overflowing the sum
        let difficulty_blocks_len = difficulty_blocks.len() as u64;
        let targets_sum: Uint320 =
            difficulty_blocks.into_iter().fold(Uint320::ZERO, |sum, block| sum + Uint320::from(compact_to_big(block.bits)));
        let average_target = targets_sum / Uint320::from_u64(difficulty_blocks_len);

        // Normalize by the ratio between the actual and expected spans
        let actual_span = max(max_ts - min_ts, 1);
        let expected_span = self.target_time_per_block * difficulty_blocks_len;
        let (scaled, overflow) = average_target.overflowing_mul(Uint320::from_u64(actual_span));
        let new_target = if overflow { Uint320::from(self.max_difficulty_target) } else { scaled / Uint320::from_u64(expected_span) };

        let new_target = Uint256::try_from(new_target)
            .unwrap_or(self.max_difficulty_target)
            .min(self.max_difficulty_target);
        big_to_compact(new_target)
    }

    fn get_difficulty_blocks(&self, window: &BlockWindowHeap) -> Vec<DifficultyBlock> {
        window
            .iter()
            .map(|item| {
                let data = self.headers_store.get_compact_header_data(item.0.hash).unwrap();
                DifficultyBlock { timestamp: data.timestamp, bits: data.bits, sortable_block: item.0.clone() }
            })
            .collect()
    }
}

#[derive(Eq)]
struct DifficultyBlock {
    timestamp: u64,
    bits: u32,
    sortable_block: SortableBlock,
}

impl PartialEq for DifficultyBlock {
    fn eq(&self, other: &Self) -> bool {
        // If the sortable blocks are equal the timestamps are equal as well
        self.sortable_block == other.sortable_block
    }
}

impl PartialOrd for DifficultyBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DifficultyBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp.cmp(&other.timestamp).then_with(|| self.sortable_block.cmp(&other.sortable_block))
    }
}
