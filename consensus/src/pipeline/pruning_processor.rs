use crate::{
    consensus::{services::ConsensusServices, storage::ConsensusStorage},
    model::{
        services::reachability::ReachabilityService,
        stores::{
            acceptance_data::AcceptanceDataStore,
            block_transactions::BlockTransactionsStore,
            daa::{DaaStore, DaaStoreReader},
            depth::DepthStore,
            ghostdag::GhostdagStoreReader,
            headers::HeaderStoreReader,
            pruning::{PruningStore, PruningStoreReader},
            relations::{RelationsStore, RelationsStoreReader},
            selected_chain::SelectedChainStore,
            statuses::StatusesStoreBatchExtensions,
            tips::TipsStore,
            utxo_diffs::UtxoDiffsStore,
            utxo_multisets::UtxoMultisetsStore,
            utxo_set::UtxoSetStore,
            virtual_state::{VirtualState, VirtualStateStore, VirtualStateStoreReader},
            DB,
        },
    },
    pipeline::virtual_processor::VirtualStateProcessor,
    processes::{ghostdag::ordering::SortableBlock, reachability::inquirer as reachability},
};
use itertools::Itertools;
use kyanite_consensus_core::{
    blockhash::{BlockHashExtensions, ORIGIN},
    blockstatus::BlockStatus::StatusHeaderOnly,
    config::params::Params,
    errors::pruning::{PruningImportError, PruningImportResult},
    muhash::MuHashExtensions,
    tx::{TransactionOutpoint, UtxoEntry},
    BlockHashSet, HashMapCustomHasher,
};
use kyanite_database::prelude::{BatchDbWriter, StoreResultExtensions};
use kyanite_hashes::Hash;
use kyanite_muhash::MuHash;
use log::info;
use rocksdb::WriteBatch;
use std::{collections::VecDeque, sync::Arc};

/// Owns pruning-point movement and the deletion of deep-past data
pub struct PruningProcessor {
    db: Arc<DB>,
    storage: Arc<ConsensusStorage>,
    services: Arc<ConsensusServices>,
    genesis_hash: Hash,
    difficulty_window_size: usize,
    past_median_time_window_size: usize,
}

impl PruningProcessor {
    pub fn new(params: &Params, db: Arc<DB>, storage: Arc<ConsensusStorage>, services: Arc<ConsensusServices>) -> Self {
        Self {
            db,
            storage,
            services,
            genesis_hash: params.genesis_hash(),
            difficulty_window_size: params.difficulty_window_size,
            past_median_time_window_size: params.past_median_time_window_size(),
        }
    }

    /// Checks whether the pruning point should advance following a virtual
    /// update, and if so moves it, refreshes the frozen pruning UTXO set and
    /// prunes the data below it
    pub fn advance_pruning_point_if_needed(&self, virtual_processor: &VirtualStateProcessor) {
        let virtual_state = self.storage.virtual_state_store.read().get().unwrap();
        if virtual_state.ghostdag_data.selected_parent == self.genesis_hash {
            return;
        }

        let current_pruning_point = self.storage.pruning_store.read().pruning_point().unwrap();
        let current_candidate = self.storage.pruning_store.read().pruning_point_candidate().unwrap();
        let finality_point = virtual_processor.virtual_finality_point(&virtual_state.ghostdag_data);

        let (new_pruning_point, new_candidate) = self.services.pruning_manager.next_pruning_point_and_candidate(
            virtual_state.ghostdag_data.to_compact(),
            finality_point,
            current_candidate,
            current_pruning_point,
        );

        if new_pruning_point == current_pruning_point && new_candidate == current_candidate {
            return;
        }

        {
            let mut batch = WriteBatch::default();
            let mut pruning_write = self.storage.pruning_store.write();
            pruning_write.set_batch(&mut batch, new_pruning_point, new_candidate).unwrap();
            self.db.write(batch).unwrap();
            drop(pruning_write);
        }

        if new_pruning_point != current_pruning_point {
            info!("moving pruning point from {} to {}", current_pruning_point, new_pruning_point);
            self.update_pruning_utxo_set(virtual_processor, new_pruning_point);
            self.prune(new_pruning_point);
        }
    }

    /// Freezes the new pruning point's UTXO set: the canonical anchor served
    /// to new full-sync peers
    fn update_pruning_utxo_set(&self, virtual_processor: &VirtualStateProcessor, pruning_point: Hash) {
        let diff_from_virtual = virtual_processor.restore_diff_from_virtual(pruning_point);

        let mut batch = WriteBatch::default();
        let mut pruning_utxo_write = self.storage.pruning_utxo_store.write();
        pruning_utxo_write.clear_batch(&mut batch).unwrap();

        // Materialize (virtual utxo set ⊕ diff) into the pruning utxo bucket
        let virtual_utxo_read = self.storage.virtual_utxo_store.read();
        let mut entries: Vec<(TransactionOutpoint, UtxoEntry)> = Vec::new();
        for pair in virtual_utxo_read.iterator() {
            let (outpoint, entry) = pair.unwrap();
            if !diff_from_virtual.remove.contains_key(&outpoint) {
                entries.push((outpoint, (*entry).clone()));
            }
        }
        entries.extend(diff_from_virtual.add.iter().map(|(o, e)| (*o, e.clone())));
        pruning_utxo_write.write_many_batch(&mut batch, &entries).unwrap();

        self.db.write(batch).unwrap();
        drop(virtual_utxo_read);
        drop(pruning_utxo_write);
    }

    /// Deletes all block data strictly in the past of the new pruning point:
    /// bodies, UTXO diffs, acceptance data, multisets, DAA and depth entries,
    /// GHOSTDAG data, relations and reachability entries. Headers are
    /// retained and statuses drop to header-only.
    fn prune(&self, new_pruning_point: Hash) {
        // Collect the past of the pruning point via BFS over relations
        let mut queue: VecDeque<Hash> =
            self.storage.relations_store.read().get_parents(new_pruning_point).unwrap().iter().copied().collect();
        let mut past = BlockHashSet::new();
        while let Some(current) = queue.pop_front() {
            if current.is_origin() || !past.insert(current) {
                continue;
            }
            if let Some(parents) = self.storage.relations_store.read().get_parents(current).unwrap_option() {
                queue.extend(parents.iter().copied());
            }
        }

        if past.is_empty() {
            return;
        }

        // Delete newest-first so reachability fix-ups always reference still-existing older blocks
        let ordered = past
            .iter()
            .copied()
            .map(|hash| SortableBlock::new(hash, self.storage.ghostdag_store.get_blue_work(hash).unwrap()))
            .sorted()
            .rev()
            .map(|sb| sb.hash)
            .collect_vec();

        info!("pruning {} blocks below pruning point {}", ordered.len(), new_pruning_point);

        for block in ordered {
            let mut batch = WriteBatch::default();

            // Reachability: detach the block from the tree and the future covering sets
            {
                let mergeset = self
                    .storage
                    .ghostdag_store
                    .get_data(block)
                    .map(|data| data.unordered_mergeset_without_selected_parent().collect_vec())
                    .unwrap_or_default();
                let mut staging = crate::model::stores::reachability::StagingReachabilityStore::new(
                    self.storage.reachability_store.upgradable_read(),
                );
                reachability::delete_block(&mut staging, block, &mut mergeset.into_iter()).unwrap();
                let reachability_write = staging.commit(&mut batch).unwrap();

                // Relations: detach and substitute origin as the parent of surviving children
                let mut relations_write = self.storage.relations_store.write();
                let children = relations_write.get_children(block).unwrap();
                for child in children.iter().copied().filter(|&c| !past.contains(&c)) {
                    relations_write
                        .replace_parent_with_writer(BatchDbWriter::new(&mut batch), child, block, ORIGIN)
                        .unwrap();
                }
                relations_write.delete_entries_with_writer(BatchDbWriter::new(&mut batch), block).unwrap();

                // Block data past the header level
                self.storage.block_transactions_store.delete_batch(&mut batch, block).unwrap();
                self.storage.utxo_diffs_store.delete_batch(&mut batch, block).unwrap();
                self.storage.utxo_multisets_store.delete_batch(&mut batch, block).unwrap();
                self.storage.acceptance_data_store.delete_batch(&mut batch, block).unwrap();
                self.storage.daa_store.delete_batch(&mut batch, block).unwrap();
                self.storage.depth_store.delete_batch(&mut batch, block).unwrap();
                self.storage.ghostdag_store.delete_batch(&mut batch, block).unwrap();

                let statuses_write = self.storage.statuses_store.set_batch(&mut batch, block, StatusHeaderOnly).unwrap();

                self.db.write(batch).unwrap();
                drop(statuses_write);
                drop(relations_write);
                drop(reachability_write);
            }
        }
    }

    /// Serializes the frozen pruning point UTXO set
    pub fn get_pruning_point_utxo_set(&self) -> Vec<u8> {
        let pruning_utxo_read = self.storage.pruning_utxo_store.read();
        let entries: Vec<(TransactionOutpoint, UtxoEntry)> =
            pruning_utxo_read.iterator().map(|pair| pair.map(|(o, e)| (o, (*e).clone())).unwrap()).collect();
        bincode::serialize(&entries).expect("utxo entries are serializable")
    }

    /// Imports a serialized pruning-point UTXO set received from a peer:
    /// verifies the multiset hash against the pruning point header's
    /// commitment and atomically replaces the virtual UTXO set (spec §4.6
    /// pruning-point import)
    pub fn import_pruning_point_utxo_set(&self, pruning_point: Hash, serialized_utxo_set: &[u8]) -> PruningImportResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        // A peer offering a different pruning point than the one negotiated
        // fails the sync session
        if let Some(expected) = self.storage.pruning_store.read().importing_pruning_point().unwrap() {
            if expected != pruning_point {
                return Err(PruningImportError::UnexpectedPruningPoint(pruning_point, expected));
            }
        }

        let header = self
            .storage
            .headers_store
            .get_header(pruning_point)
            .map_err(|_| PruningImportError::PruningPointHeaderMissing(pruning_point))?;

        let entries: Vec<(TransactionOutpoint, UtxoEntry)> =
            bincode::deserialize(serialized_utxo_set).map_err(|_| PruningImportError::DeserializationFailure)?;

        // The imported multiset must reproduce the header's UTXO commitment
        let mut multiset = MuHash::new();
        for (outpoint, entry) in entries.iter() {
            multiset.add_utxo(outpoint, entry);
        }
        let imported_hash = multiset.finalize();
        if imported_hash != header.utxo_commitment {
            return Err(PruningImportError::ImportedMultisetHashMismatch(header.utxo_commitment, imported_hash));
        }

        // Atomically replace both UTXO sets and anchor the pruning point
        let mut batch = WriteBatch::default();
        let mut pruning_utxo_write = self.storage.pruning_utxo_store.write();
        pruning_utxo_write.clear_batch(&mut batch).unwrap();
        pruning_utxo_write.write_many_batch(&mut batch, &entries).unwrap();

        let mut virtual_utxo_write = self.storage.virtual_utxo_store.write();
        virtual_utxo_write.clear_batch(&mut batch).unwrap();
        virtual_utxo_write.write_many_batch(&mut batch, &entries).unwrap();

        self.storage.utxo_multisets_store.insert_batch(&mut batch, pruning_point, multiset.clone()).unwrap();
        self.storage.utxo_diffs_store.set_as_anchor_batch(&mut batch, pruning_point).unwrap();

        // Re-anchor the virtual at the pruning point: the virtual UTXO set
        // now equals the pruning point state, and the chain resolution will
        // rebuild everything above it as bodies stream in
        let pp_ghostdag = self.storage.ghostdag_store.get_data(pruning_point).unwrap();
        let daa_window = self.services.dag_traversal_manager.block_window(&pp_ghostdag, self.difficulty_window_size);
        let bits = self.services.difficulty_manager.calculate_difficulty_bits(&daa_window);
        let pmt_window = self.services.dag_traversal_manager.block_window(&pp_ghostdag, self.past_median_time_window_size);
        let past_median_time = self.services.past_median_time_manager.calc_past_median_time(&pp_ghostdag, &pmt_window);
        let anchored_state = Arc::new(VirtualState::new(
            vec![pruning_point],
            self.storage.daa_store.get_daa_score(pruning_point).unwrap(),
            bits,
            past_median_time,
            multiset,
            Default::default(), // The virtual coincides with the pruning point state until bodies arrive
            Vec::new(),
            Default::default(),
            Default::default(),
            (*pp_ghostdag).clone(),
        ));
        let mut virtual_state_write = self.storage.virtual_state_store.write();
        virtual_state_write.set_batch(&mut batch, anchored_state).unwrap();

        let mut tips_write = self.storage.tips_store.write();
        tips_write.init_batch(&mut batch, &[pruning_point]).unwrap();

        let mut selected_chain_write = self.storage.selected_chain_store.write();
        selected_chain_write.init_with_pruning_point_batch(&mut batch, pruning_point).unwrap();

        let mut pruning_write = self.storage.pruning_store.write();
        pruning_write.set_batch(&mut batch, pruning_point, pruning_point).unwrap();
        pruning_write.set_importing_pruning_point_batch(&mut batch, None).unwrap();

        self.db.write(batch).unwrap();
        drop(pruning_write);
        drop(selected_chain_write);
        drop(tips_write);
        drop(virtual_state_write);
        drop(virtual_utxo_write);
        drop(pruning_utxo_write);

        Ok(entries)
    }
}
