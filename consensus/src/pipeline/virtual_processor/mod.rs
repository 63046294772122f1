mod utxo_validation;

pub(crate) use utxo_validation::calc_accepted_id_merkle_root;

use crate::{
    consensus::{services::ConsensusServices, storage::ConsensusStorage},
    model::{
        services::reachability::ReachabilityService,
        stores::{
            acceptance_data::AcceptanceDataStore,
            daa::DaaStoreReader,
            ghostdag::{GhostdagData, GhostdagStoreReader},
            headers::HeaderStoreReader,
            selected_chain::SelectedChainStore,
            statuses::{StatusesStore, StatusesStoreBatchExtensions, StatusesStoreReader},
            tips::TipsStoreReader,
            utxo_diffs::{UtxoDiffsStore, UtxoDiffsStoreReader},
            utxo_multisets::{UtxoMultisetsStore, UtxoMultisetsStoreReader},
            utxo_set::UtxoSetStore,
            virtual_state::{VirtualState, VirtualStateStore, VirtualStateStoreReader},
            DB,
        },
    },
    pipeline::virtual_processor::utxo_validation::UtxoProcessingContext,
    processes::transaction_validator::tx_validation_in_utxo_context::TxValidationFlags,
};
use itertools::Itertools;
use kyanite_consensus_core::{
    block::{BlockTemplate, MutableBlock},
    blockstatus::BlockStatus::{StatusDisqualifiedFromChain, StatusUTXOValid},
    coinbase::MinerData,
    config::params::Params,
    constants::BLOCK_VERSION,
    errors::block::{BlockProcessResult, RuleError},
    errors::tx::TxResult,
    header::Header,
    merkle::calc_hash_merkle_root,
    tx::{MutableTransaction, Transaction},
    utxo::{
        utxo_diff::UtxoDiff,
        utxo_view::{UtxoView, UtxoViewComposition},
    },
    BlockHashSet, ChainPath, HashMapCustomHasher,
};
use kyanite_database::prelude::StoreResultExtensions;
use kyanite_hashes::Hash;
use kyanite_muhash::MuHash;
use log::{info, warn};
use rocksdb::WriteBatch;
use std::{
    cmp::Reverse,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

pub struct VirtualStateProcessor {
    // Config
    pub(super) genesis_hash: Hash,
    max_block_parents: u8,
    mergeset_size_limit: u64,
    finality_depth: u64,
    difficulty_window_size: usize,
    past_median_time_window_size: usize,

    // DB
    db: Arc<DB>,

    // Stores and services
    pub(super) storage: Arc<ConsensusStorage>,
    pub(super) services: Arc<ConsensusServices>,
}

impl VirtualStateProcessor {
    pub fn new(params: &Params, db: Arc<DB>, storage: Arc<ConsensusStorage>, services: Arc<ConsensusServices>) -> Self {
        Self {
            genesis_hash: params.genesis_hash(),
            max_block_parents: params.max_block_parents,
            mergeset_size_limit: params.mergeset_size_limit,
            finality_depth: params.finality_depth,
            difficulty_window_size: params.difficulty_window_size,
            past_median_time_window_size: params.past_median_time_window_size(),
            db,
            storage,
            services,
        }
    }

    /// The current virtual finality point: the highest chain block whose blue
    /// score is at least `finality_depth` below the virtual blue score
    pub fn virtual_finality_point(&self, virtual_ghostdag_data: &GhostdagData) -> Hash {
        self.services
            .dag_traversal_manager
            .highest_chain_block_below_blue_score(
                virtual_ghostdag_data.selected_parent,
                virtual_ghostdag_data.blue_score.saturating_sub(self.finality_depth),
            )
            .unwrap_or(self.genesis_hash)
    }

    /// Recomputes the virtual state following a change to the DAG tips:
    /// selects the virtual parents, resolves the new selected-parent chain
    /// (computing or validating the UTXO state of every chain block), updates
    /// the virtual UTXO set and commits the new state. Returns the resulting
    /// selected-parent chain delta.
    pub fn resolve_virtual(&self) -> BlockProcessResult<ChainPath> {
        let mut excluded = BlockHashSet::new();
        loop {
            let prev_state = self.storage.virtual_state_store.read().get().unwrap();
            let (virtual_parents, virtual_ghostdag) = self.pick_virtual_parents(&prev_state, &excluded);

            match self.try_commit_virtual(&prev_state, virtual_parents, virtual_ghostdag) {
                Ok(chain_path) => return Ok(chain_path),
                Err(VirtualResolutionError::SelectedParentDisqualified(disqualified)) => {
                    warn!("virtual selected parent candidate {} is disqualified from chain, retrying", disqualified);
                    // Exclude all tips merging the disqualified candidate and retry
                    let tips = self.storage.tips_store.read().get().unwrap();
                    excluded.extend(
                        tips.iter().copied().filter(|&tip| self.services.reachability_service.is_dag_ancestor_of(disqualified, tip)),
                    );
                    if excluded.len() >= tips.len() {
                        // No valid candidate remains; the virtual stays unchanged
                        return Ok(ChainPath::default());
                    }
                }
            }
        }
    }

    /// Picks the virtual parents out of the current tips: up to
    /// `max_block_parents` highest tips by the canonical ordering, excluding
    /// finality violators, constrained by the merge-set size limit
    fn pick_virtual_parents(&self, prev_state: &VirtualState, excluded: &BlockHashSet) -> (Vec<Hash>, GhostdagData) {
        let finality_point = self.virtual_finality_point(&prev_state.ghostdag_data);
        let tips = self.storage.tips_store.read().get().unwrap();

        let mut candidates = tips
            .iter()
            .copied()
            .filter(|tip| !excluded.contains(tip))
            .filter(|&tip| {
                let status = self.storage.statuses_store.read().get(tip).unwrap();
                if !status.has_block_body() || status.is_invalid() {
                    return false;
                }
                // A block whose selected chain misses the finality point may
                // never become (or select) the virtual selected parent
                self.services.reachability_service.is_chain_ancestor_of(finality_point, tip)
            })
            .map(|tip| Reverse(crate::processes::ghostdag::ordering::SortableBlock {
                hash: tip,
                blue_work: self.storage.ghostdag_store.get_blue_work(tip).unwrap(),
            }))
            .collect_vec();
        candidates.sort();

        let mut virtual_parents: Vec<Hash> =
            candidates.into_iter().take(self.max_block_parents as usize).map(|r| r.0.hash).collect();
        if virtual_parents.is_empty() {
            // No eligible tips; fall back to the previous virtual parents
            virtual_parents = prev_state.parents.clone();
        }

        // Constrain the virtual merge set to the consensus limit by dropping
        // the lowest-work parents
        loop {
            let virtual_ghostdag = self.services.ghostdag_manager.ghostdag(&virtual_parents, None);
            if (virtual_ghostdag.mergeset_size() - 1) as u64 <= self.mergeset_size_limit || virtual_parents.len() == 1 {
                return (virtual_parents, virtual_ghostdag);
            }
            virtual_parents.pop();
        }
    }

    /// Attempts to move the virtual to the chain selected by the given
    /// parents. Chain blocks whose UTXO state contradicts their commitments
    /// are disqualified, failing the attempt.
    fn try_commit_virtual(
        &self,
        prev_state: &VirtualState,
        virtual_parents: Vec<Hash>,
        virtual_ghostdag: GhostdagData,
    ) -> Result<ChainPath, VirtualResolutionError> {
        let prev_selected = prev_state.ghostdag_data.selected_parent;
        let new_selected = virtual_ghostdag.selected_parent;

        // The accumulated diff is maintained as the diff from the current
        // (persisted) virtual UTXO set to the state at the walk location
        let mut accumulated_diff = prev_state.utxo_diff.clone().to_reversed();

        let mut chain_path = ChainPath::default();

        // Walk down to the reorg split point
        let mut split_point = prev_selected;
        for current in self.services.reachability_service.default_backward_chain_iterator(prev_selected) {
            if self.services.reachability_service.is_chain_ancestor_of(current, new_selected) {
                split_point = current;
                break;
            }
            let parent = self.storage.ghostdag_store.get_selected_parent(current).unwrap();
            debug_assert_eq!(
                self.storage.utxo_diffs_store.get_diff_child(parent).unwrap(),
                current,
                "the diff chain of the active selected chain must be intact"
            );
            // Apply the stored diff in reverse
            let diff = self.storage.utxo_diffs_store.get(parent).unwrap();
            accumulated_diff.with_diff_in_place(&diff.as_reversed()).unwrap();
            chain_path.removed.push(current);
        }

        // Walk back up to the new virtual selected parent, computing or
        // reusing the UTXO state of every chain block on the way
        for (parent, current) in
            self.services.reachability_service.forward_chain_iterator(split_point, new_selected, true).tuple_windows()
        {
            chain_path.added.push(current);

            // Propagate disqualification down the chain
            if self.storage.statuses_store.read().get(parent).unwrap() == StatusDisqualifiedFromChain {
                self.storage.statuses_store.write().set(current, StatusDisqualifiedFromChain).unwrap();
                continue;
            }

            // Hot path: the diff chain already covers this transition
            if self.storage.utxo_diffs_store.get_diff_child(parent).unwrap_option() == Some(current)
                && self.storage.statuses_store.read().get(current).unwrap() == StatusUTXOValid
            {
                let diff = self.storage.utxo_diffs_store.get(parent).unwrap();
                accumulated_diff.with_diff_in_place(diff.as_ref()).unwrap();
                continue;
            }

            // Compute the UTXO state of `current` over the state of `parent`
            let header = self.storage.headers_store.get_header(current).unwrap();
            let mergeset_data = self.storage.ghostdag_store.get_data(current).unwrap();
            debug_assert_eq!(mergeset_data.selected_parent, parent);
            let pov_daa_score = self.storage.daa_store.get_daa_score(current).unwrap();
            let pov_past_median_time = {
                let window = self.services.dag_traversal_manager.block_window(&mergeset_data, self.past_median_time_window_size);
                self.services.past_median_time_manager.calc_past_median_time(&mergeset_data, &window)
            };

            let selected_parent_multiset_hash = self.storage.utxo_multisets_store.get(parent).unwrap();
            let selected_parent_utxo_view = self.virtual_utxo_view().compose(&accumulated_diff);

            let mut ctx = UtxoProcessingContext::new(mergeset_data.clone(), selected_parent_multiset_hash);
            self.calculate_utxo_state(&mut ctx, &selected_parent_utxo_view, pov_daa_score, pov_past_median_time);
            let res = self.verify_expected_utxo_state(&mut ctx, &selected_parent_utxo_view, &header, pov_past_median_time);

            if let Err(rule_error) = res {
                info!("block {} is disqualified from the virtual chain: {}", current, rule_error);
                self.storage.statuses_store.write().set(current, StatusDisqualifiedFromChain).unwrap();
            } else {
                accumulated_diff.with_diff_in_place(&ctx.mergeset_diff).unwrap();
                self.commit_utxo_state(parent, current, ctx);
            }
        }

        // A disqualified sink fails the attempt. A pending sink is possible
        // only right after a pruning-point import (where its own state is
        // trusted); in the regular flow the walk above always settles it.
        if self.storage.statuses_store.read().get(new_selected).unwrap() == StatusDisqualifiedFromChain {
            return Err(VirtualResolutionError::SelectedParentDisqualified(new_selected));
        }

        // Calculate the new virtual UTXO state relative to the new selected parent
        let selected_parent_multiset_hash = self.storage.utxo_multisets_store.get(new_selected).unwrap();
        let selected_parent_utxo_view = self.virtual_utxo_view().compose(&accumulated_diff);
        let virtual_ghostdag = Arc::new(virtual_ghostdag);
        let mut ctx = UtxoProcessingContext::new(virtual_ghostdag.clone(), selected_parent_multiset_hash);

        // Virtual DAA score, difficulty and past median time
        let selected_parent_daa_score = self.storage.daa_store.get_daa_score(new_selected).unwrap();
        let (virtual_daa_score, mergeset_non_daa) = self.services.difficulty_manager.calc_daa_score_and_mergeset_non_daa_blocks(
            &virtual_ghostdag,
            self.storage.ghostdag_store.as_ref(),
            selected_parent_daa_score,
        );
        let daa_window = self.services.dag_traversal_manager.block_window(&virtual_ghostdag, self.difficulty_window_size);
        let virtual_bits = self.services.difficulty_manager.calculate_difficulty_bits(&daa_window);
        let pmt_window = self.services.dag_traversal_manager.block_window(&virtual_ghostdag, self.past_median_time_window_size);
        let virtual_past_median_time = self.services.past_median_time_manager.calc_past_median_time(&virtual_ghostdag, &pmt_window);

        self.calculate_utxo_state(&mut ctx, &selected_parent_utxo_view, virtual_daa_score, virtual_past_median_time);

        // Update the accumulated diff with the virtual's own merge-set diff
        accumulated_diff.with_diff_in_place(&ctx.mergeset_diff).unwrap();

        let new_virtual_state = Arc::new(VirtualState::new(
            virtual_parents,
            virtual_daa_score,
            virtual_bits,
            virtual_past_median_time,
            ctx.multiset_hash.clone(),
            ctx.mergeset_diff,
            ctx.accepted_tx_ids,
            ctx.mergeset_rewards,
            mergeset_non_daa,
            (*virtual_ghostdag).clone(),
        ));

        let mut batch = WriteBatch::default();

        // Apply the accumulated diff to the virtual UTXO set
        let mut virtual_utxo_write = self.storage.virtual_utxo_store.write();
        virtual_utxo_write.write_diff_batch(&mut batch, &accumulated_diff).unwrap();

        // The new selected parent becomes the diff anchor; the previous one
        // is rewired to point at it (spec §4.6 virtual maintenance step 4)
        self.storage.utxo_diffs_store.set_as_anchor_batch(&mut batch, new_selected).unwrap();
        if prev_selected != new_selected && !chain_path.removed.is_empty() {
            // Reorg case: compose the diff from the previous selected parent
            // to the new one through the old and new virtual states
            let relocated = prev_state
                .utxo_diff
                .with_diff(&accumulated_diff)
                .and_then(|d| d.with_diff(&new_virtual_state.utxo_diff.as_reversed()))
                .unwrap();
            self.storage.utxo_diffs_store.set_diff_and_child_batch(&mut batch, prev_selected, Arc::new(relocated), new_selected).unwrap();
        }

        // Update the selected chain index
        let mut selected_chain_write = self.storage.selected_chain_store.write();
        selected_chain_write.apply_changes_batch(&mut batch, &chain_path).unwrap();

        // Update the virtual state
        let mut virtual_state_write = self.storage.virtual_state_store.write();
        virtual_state_write.set_batch(&mut batch, new_virtual_state).unwrap();

        // Flush the batch changes
        self.db.write(batch).unwrap();

        drop(virtual_state_write);
        drop(selected_chain_write);
        drop(virtual_utxo_write);

        Ok(chain_path)
    }

    /// Commits the resolved UTXO state of chain block `current` (whose chain
    /// predecessor is `parent`): acceptance data and multiset keyed by the
    /// block, the merge-set diff keyed by the predecessor (whose diff child
    /// `current` becomes), and the status promotion.
    fn commit_utxo_state(&self, parent: Hash, current: Hash, ctx: UtxoProcessingContext) {
        let mut batch = WriteBatch::default();
        self.storage.utxo_diffs_store.set_diff_and_child_batch(&mut batch, parent, Arc::new(ctx.mergeset_diff), current).unwrap();
        self.storage.utxo_multisets_store.insert_batch(&mut batch, current, ctx.multiset_hash).unwrap();
        self.storage.acceptance_data_store.insert_batch(&mut batch, current, Arc::new(ctx.mergeset_acceptance_data)).unwrap();
        let statuses_write = self.storage.statuses_store.set_batch(&mut batch, current, StatusUTXOValid).unwrap();
        self.db.write(batch).unwrap();
        drop(statuses_write);
    }

    fn virtual_utxo_view(&self) -> impl UtxoView + '_ {
        VirtualUtxoStoreView { processor: self }
    }

    /// Reconstructs the UTXO state of a chain block as a diff over the
    /// current virtual UTXO set (spec §4.6 past-UTXO reconstruction): walk
    /// the diff-child chain from the block to the anchor collecting diffs,
    /// then apply them reversed, anchor-side first.
    pub fn restore_diff_from_virtual(&self, block: Hash) -> UtxoDiff {
        let mut collected = Vec::new();
        let mut current = block;
        while let Some(child) = self.storage.utxo_diffs_store.get_diff_child(current).unwrap_option() {
            collected.push(self.storage.utxo_diffs_store.get(current).unwrap());
            current = child;
        }
        // `current` is now the diff anchor (the virtual selected parent);
        // start from the virtual's own diff and unwind downwards
        let virtual_state = self.storage.virtual_state_store.read().get().unwrap();
        let mut accumulated = virtual_state.utxo_diff.clone().to_reversed();
        for diff in collected.iter().rev() {
            accumulated.with_diff_in_place(&diff.as_reversed()).unwrap();
        }
        accumulated
    }

    /// Builds a block template over the current virtual state
    pub fn build_block_template(&self, miner_data: MinerData, mut txs: Vec<Transaction>) -> Result<BlockTemplate, RuleError> {
        let virtual_state = self.storage.virtual_state_store.read().get().unwrap();

        // Validate the provided transactions against the virtual UTXO set
        let virtual_utxo_view = self.virtual_utxo_view();
        for tx in txs.iter() {
            self.services
                .transaction_validator
                .validate_tx_in_isolation(tx)
                .and_then(|_| {
                    self.validate_transaction_in_utxo_context(
                        tx,
                        &virtual_utxo_view,
                        virtual_state.daa_score,
                        virtual_state.past_median_time,
                        TxValidationFlags::Full,
                    )
                    .map(|_| ())
                })
                .map_err(|e| RuleError::TxInContextFailed(tx.id(), e))?;
        }

        let coinbase = self
            .services
            .coinbase_manager
            .expected_coinbase_transaction(
                miner_data.clone(),
                &virtual_state.ghostdag_data,
                &virtual_state.mergeset_rewards,
                &virtual_state.mergeset_non_daa,
            )
            .unwrap();
        // Transactions must be ordered by subnetwork, with the coinbase first
        txs.sort_by(|a, b| a.subnetwork_id.cmp(&b.subnetwork_id));
        txs.insert(0, coinbase.tx);

        let mut parents = virtual_state.parents.clone();
        parents.sort();

        let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("system time before unix epoch").as_millis() as u64;
        // Past median time is the exclusive lower bound for a valid block time
        let min_block_time = virtual_state.past_median_time + 1;

        let header = Header::new(
            BLOCK_VERSION,
            parents,
            calc_hash_merkle_root(txs.iter()),
            calc_accepted_id_merkle_root(virtual_state.accepted_tx_ids.iter().copied()),
            virtual_state.multiset.clone().finalize(),
            u64::max(min_block_time, now),
            virtual_state.bits,
            0, // The miner is expected to search the nonce space
        );
        let selected_parent_timestamp =
            self.storage.headers_store.get_timestamp(virtual_state.ghostdag_data.selected_parent).unwrap();
        Ok(BlockTemplate::new(MutableBlock::new(header, txs), miner_data, selected_parent_timestamp))
    }

    /// Populates a free transaction (e.g. a mempool candidate) from the
    /// virtual UTXO set and fully validates it in the virtual context
    pub fn validate_mempool_transaction_and_populate(&self, mutable_tx: &mut MutableTransaction) -> TxResult<()> {
        self.services.transaction_validator.validate_tx_in_isolation(&mutable_tx.tx)?;

        let virtual_state = self.storage.virtual_state_store.read().get().unwrap();
        let virtual_utxo_view = self.virtual_utxo_view();

        let mut has_missing_outpoints = false;
        for i in 0..mutable_tx.tx.inputs.len() {
            if mutable_tx.entries[i].is_some() {
                // We prefer a previously populated entry if such exists
                continue;
            }
            if let Some(entry) = virtual_utxo_view.get(&mutable_tx.tx.inputs[i].previous_outpoint) {
                mutable_tx.entries[i] = Some(entry);
            } else {
                // We attempt to fill as much as possible UTXO entries, hence we do not break in this case
                has_missing_outpoints = true;
            }
        }
        if has_missing_outpoints {
            return Err(kyanite_consensus_core::errors::tx::TxRuleError::MissingTxOutpoints);
        }

        // At this point we know all UTXO entries are populated
        let calculated_fee = self.services.transaction_validator.validate_populated_transaction_and_get_fee(
            &mutable_tx.as_verifiable(),
            virtual_state.daa_score,
            virtual_state.past_median_time,
            TxValidationFlags::Full,
        )?;
        mutable_tx.calculated_fee = Some(calculated_fee);
        Ok(())
    }

    /// Assembles a full valid block over the given parents: the test/mining
    /// counterpart of `build_block_template` for an arbitrary attach point.
    /// The selected parent must be reachable through the diff-child chain.
    pub fn build_block_with_parents(
        &self,
        parents: Vec<Hash>,
        miner_data: MinerData,
        mut txs: Vec<Transaction>,
    ) -> MutableBlock {
        let ghostdag_data = Arc::new(self.services.ghostdag_manager.ghostdag(&parents, None));
        let selected_parent = ghostdag_data.selected_parent;

        let daa_window = self.services.dag_traversal_manager.block_window(&ghostdag_data, self.difficulty_window_size);
        let bits = self.services.difficulty_manager.calculate_difficulty_bits(&daa_window);
        let selected_parent_daa_score = self.storage.daa_store.get_daa_score(selected_parent).unwrap();
        let (daa_score, mergeset_non_daa) = self.services.difficulty_manager.calc_daa_score_and_mergeset_non_daa_blocks(
            &ghostdag_data,
            self.storage.ghostdag_store.as_ref(),
            selected_parent_daa_score,
        );
        let pmt_window = self.services.dag_traversal_manager.block_window(&ghostdag_data, self.past_median_time_window_size);
        let past_median_time = self.services.past_median_time_manager.calc_past_median_time(&ghostdag_data, &pmt_window);

        // Reconstruct the selected parent's UTXO state and apply the merge set over it
        let restored_diff = self.restore_diff_from_virtual(selected_parent);
        let selected_parent_utxo_view = self.virtual_utxo_view().compose(&restored_diff);
        let selected_parent_multiset = self.storage.utxo_multisets_store.get(selected_parent).unwrap();
        let mut ctx = UtxoProcessingContext::new(ghostdag_data.clone(), selected_parent_multiset);
        self.calculate_utxo_state(&mut ctx, &selected_parent_utxo_view, daa_score, past_median_time);

        let coinbase = self
            .services
            .coinbase_manager
            .expected_coinbase_transaction(miner_data, &ghostdag_data, &ctx.mergeset_rewards, &mergeset_non_daa)
            .unwrap();
        txs.sort_by(|a, b| a.subnetwork_id.cmp(&b.subnetwork_id));
        txs.insert(0, coinbase.tx);

        let mut sorted_parents = parents;
        sorted_parents.sort();

        let header = Header::new(
            BLOCK_VERSION,
            sorted_parents,
            calc_hash_merkle_root(txs.iter()),
            calc_accepted_id_merkle_root(ctx.accepted_tx_ids.iter().copied()),
            ctx.multiset_hash.finalize(),
            past_median_time + 1,
            bits,
            0,
        );
        MutableBlock::new(header, txs)
    }

    /// Initializes the virtual state from genesis
    pub fn process_genesis(&self, genesis: &kyanite_consensus_core::config::genesis::GenesisBlock) {
        let virtual_ghostdag = self.services.ghostdag_manager.ghostdag(&[self.genesis_hash], None);
        let virtual_state = Arc::new(VirtualState::from_genesis(genesis, virtual_ghostdag));

        let mut batch = WriteBatch::default();
        let mut virtual_state_write = self.storage.virtual_state_store.write();
        virtual_state_write.set_batch(&mut batch, virtual_state).unwrap();

        // Genesis is the initial diff anchor with an empty state
        self.storage.utxo_multisets_store.insert_batch(&mut batch, self.genesis_hash, MuHash::new()).unwrap();
        self.storage.acceptance_data_store.insert_batch(&mut batch, self.genesis_hash, Arc::new(Vec::new())).unwrap();
        let statuses_write = self.storage.statuses_store.set_batch(&mut batch, self.genesis_hash, StatusUTXOValid).unwrap();

        let mut selected_chain_write = self.storage.selected_chain_store.write();
        selected_chain_write.init_with_pruning_point_batch(&mut batch, self.genesis_hash).unwrap();

        self.db.write(batch).unwrap();
        drop(statuses_write);
        drop(selected_chain_write);
        drop(virtual_state_write);
    }
}

/// A read-only view adapter over the persisted virtual UTXO set
struct VirtualUtxoStoreView<'a> {
    processor: &'a VirtualStateProcessor,
}

impl UtxoView for VirtualUtxoStoreView<'_> {
    fn get(&self, outpoint: &kyanite_consensus_core::tx::TransactionOutpoint) -> Option<kyanite_consensus_core::tx::UtxoEntry> {
        let guard = self.processor.storage.virtual_utxo_store.read();
        UtxoView::get(&*guard, outpoint)
    }
}

enum VirtualResolutionError {
    SelectedParentDisqualified(Hash),
}
