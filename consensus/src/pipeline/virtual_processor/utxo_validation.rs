use super::VirtualStateProcessor;
use crate::{
    model::stores::{
        block_transactions::BlockTransactionsStoreReader,
        daa::DaaStoreReader,
        ghostdag::GhostdagData,
    },
    processes::transaction_validator::tx_validation_in_utxo_context::TxValidationFlags,
};
use kyanite_consensus_core::{
    acceptance_data::{AcceptanceData, BlockAcceptanceData, TransactionAcceptanceData},
    coinbase::BlockRewardData,
    errors::{
        block::{BlockProcessResult, RuleError},
        tx::{TxResult, TxRuleError},
    },
    hashing,
    header::Header,
    merkle::calc_merkle_root,
    muhash::MuHashExtensions,
    tx::{PopulatedTransaction, Transaction, TransactionId, ValidatedTransaction, VerifiableTransaction, COINBASE_TRANSACTION_INDEX},
    utxo::{
        utxo_diff::UtxoDiff,
        utxo_view::{UtxoView, UtxoViewComposition},
    },
    BlockHashMap, HashMapCustomHasher,
};
use kyanite_hashes::Hash;
use kyanite_muhash::MuHash;
use log::debug;
use std::sync::Arc;

/// A context for processing the UTXO state of a block with respect to its
/// selected parent. Note this can also be the virtual block.
pub(super) struct UtxoProcessingContext {
    pub ghostdag_data: Arc<GhostdagData>,
    pub multiset_hash: MuHash,
    pub mergeset_diff: UtxoDiff,
    pub accepted_tx_ids: Vec<TransactionId>,
    pub mergeset_acceptance_data: AcceptanceData,
    pub mergeset_rewards: BlockHashMap<BlockRewardData>,
}

impl UtxoProcessingContext {
    pub fn new(ghostdag_data: Arc<GhostdagData>, selected_parent_multiset_hash: MuHash) -> Self {
        let mergeset_size = ghostdag_data.mergeset_size();
        Self {
            ghostdag_data,
            multiset_hash: selected_parent_multiset_hash,
            mergeset_diff: UtxoDiff::default(),
            accepted_tx_ids: Vec::with_capacity(1), // We expect at least the selected parent coinbase tx
            mergeset_acceptance_data: Vec::with_capacity(mergeset_size),
            mergeset_rewards: BlockHashMap::with_capacity(mergeset_size),
        }
    }

    pub fn selected_parent(&self) -> Hash {
        self.ghostdag_data.selected_parent
    }
}

impl VirtualStateProcessor {
    /// Calculates the UTXO state and transaction acceptance data of a block
    /// relative to its selected parent state (spec §4.6 "applying blue
    /// blocks"): starting from the selected parent's past UTXO, the selected
    /// parent's coinbase is applied, then the transactions of every merge-set
    /// blue in the canonical order. Merge-set reds are recorded as not
    /// accepted.
    pub(super) fn calculate_utxo_state<V: UtxoView>(
        &self,
        ctx: &mut UtxoProcessingContext,
        selected_parent_utxo_view: &V,
        pov_daa_score: u64,
        pov_past_median_time: u64,
    ) {
        let selected_parent = ctx.selected_parent();
        let selected_parent_transactions = self.storage.block_transactions_store.get(selected_parent).unwrap();
        let validated_coinbase = ValidatedTransaction::new_coinbase(&selected_parent_transactions[COINBASE_TRANSACTION_INDEX]);

        ctx.mergeset_diff.add_transaction(&validated_coinbase, pov_daa_score).unwrap();
        ctx.multiset_hash.add_transaction(&validated_coinbase, pov_daa_score);
        ctx.accepted_tx_ids.push(validated_coinbase.id());

        let ordered_blues = ctx.ghostdag_data.mergeset_blues.clone();
        for (i, merged_block) in ordered_blues.iter().copied().enumerate() {
            let txs =
                if i == 0 { selected_parent_transactions.clone() } else { self.storage.block_transactions_store.get(merged_block).unwrap() };

            // The first blue is always the selected parent. Its transactions
            // were already script-verified against the exact same UTXO
            // context when its own chain state was resolved.
            let is_selected_parent = i == 0;
            let flags = if is_selected_parent { TxValidationFlags::SkipScriptChecks } else { TxValidationFlags::Full };

            let mut block_fee = 0u64;
            let mut accepted_transactions = Vec::with_capacity(txs.len());

            // The selected parent's coinbase was applied above; coinbases of
            // other blues are never accepted (their rewards materialize via
            // this block's own coinbase)
            accepted_transactions.push(TransactionAcceptanceData {
                transaction: txs[COINBASE_TRANSACTION_INDEX].clone(),
                fee: 0,
                is_accepted: is_selected_parent,
            });

            for tx in txs[1..].iter() {
                // Create a composed UTXO view from the selected parent view + the accumulated mergeset diff
                let composed_view = selected_parent_utxo_view.compose(&ctx.mergeset_diff);
                match self.validate_transaction_in_utxo_context(tx, &composed_view, pov_daa_score, pov_past_median_time, flags) {
                    Ok(validated_tx) => {
                        ctx.mergeset_diff.add_transaction(&validated_tx, pov_daa_score).unwrap();
                        ctx.multiset_hash.add_transaction(&validated_tx, pov_daa_score);
                        ctx.accepted_tx_ids.push(validated_tx.id());
                        block_fee += validated_tx.calculated_fee;
                        accepted_transactions.push(TransactionAcceptanceData {
                            transaction: tx.clone(),
                            fee: validated_tx.calculated_fee,
                            is_accepted: true,
                        });
                    }
                    Err(e) => {
                        debug!("tx {} of merged block {} was not accepted: {}", tx.id(), merged_block, e);
                        accepted_transactions.push(TransactionAcceptanceData { transaction: tx.clone(), fee: 0, is_accepted: false });
                    }
                }
            }

            ctx.mergeset_acceptance_data.push(BlockAcceptanceData { block_hash: merged_block, accepted_transactions });

            let coinbase_data =
                self.services.coinbase_manager.deserialize_coinbase_payload(&txs[COINBASE_TRANSACTION_INDEX].payload).unwrap();
            let subsidy = self.services.coinbase_manager.calc_block_subsidy(self.storage.daa_store.get_daa_score(merged_block).unwrap());
            ctx.mergeset_rewards
                .insert(merged_block, BlockRewardData::new(subsidy, block_fee, coinbase_data.miner_data.script_public_key));
        }

        // Merge-set reds are part of the acceptance data but none of their
        // transactions are accepted
        let reds = ctx.ghostdag_data.mergeset_reds.clone();
        for red in reds.iter().copied() {
            let txs = self.storage.block_transactions_store.get(red).unwrap();
            ctx.mergeset_acceptance_data.push(BlockAcceptanceData {
                block_hash: red,
                accepted_transactions: txs
                    .iter()
                    .map(|tx| TransactionAcceptanceData { transaction: tx.clone(), fee: 0, is_accepted: false })
                    .collect(),
            });
        }
    }

    /// Verifies that the block fully respects its own UTXO view. A block is
    /// UTXO valid if all the following hold:
    ///     1. The header carries the expected `utxo_commitment`.
    ///     2. The header carries the expected `accepted_id_merkle_root`.
    ///     3. The coinbase transaction rewards the merge-set blues correctly.
    ///     4. All non-coinbase transactions are valid against the block's own UTXO view.
    pub(super) fn verify_expected_utxo_state<V: UtxoView>(
        &self,
        ctx: &mut UtxoProcessingContext,
        selected_parent_utxo_view: &V,
        header: &Header,
        pov_past_median_time: u64,
    ) -> BlockProcessResult<()> {
        // Verify the header UTXO commitment
        let expected_commitment = ctx.multiset_hash.finalize();
        if expected_commitment != header.utxo_commitment {
            return Err(RuleError::BadUTXOCommitment(header.hash, header.utxo_commitment, expected_commitment));
        }

        // Verify the header accepted_id_merkle_root
        let expected_accepted_id_merkle_root = calc_accepted_id_merkle_root(ctx.accepted_tx_ids.iter().copied());
        if expected_accepted_id_merkle_root != header.accepted_id_merkle_root {
            return Err(RuleError::BadAcceptedIDMerkleRoot(header.hash, header.accepted_id_merkle_root, expected_accepted_id_merkle_root));
        }

        let txs = self.storage.block_transactions_store.get(header.hash).unwrap();
        let pov_daa_score = self.storage.daa_store.get_daa_score(header.hash).unwrap();

        // Verify the coinbase transaction rewards the merge set as expected
        self.verify_coinbase_transaction(&txs[COINBASE_TRANSACTION_INDEX], &ctx.ghostdag_data, &ctx.mergeset_rewards, header.hash)?;

        // Verify all the block's own transactions are valid against its UTXO view
        let current_utxo_view = selected_parent_utxo_view.compose(&ctx.mergeset_diff);
        let mut invalid_count = 0usize;
        for tx in txs[1..].iter() {
            if let Err(e) =
                self.validate_transaction_in_utxo_context(tx, &current_utxo_view, pov_daa_score, pov_past_median_time, TxValidationFlags::Full)
            {
                debug!("tx {} of block {} is invalid in its own UTXO context: {}", tx.id(), header.hash, e);
                invalid_count += 1;
            }
        }
        if invalid_count > 0 {
            return Err(RuleError::InvalidTransactionsInUtxoContext(invalid_count, txs.len() - 1));
        }

        Ok(())
    }

    fn verify_coinbase_transaction(
        &self,
        coinbase: &Transaction,
        ghostdag_data: &GhostdagData,
        mergeset_rewards: &BlockHashMap<BlockRewardData>,
        block_hash: Hash,
    ) -> BlockProcessResult<()> {
        // Extract only the miner data from the provided coinbase
        let miner_data = self.services.coinbase_manager.deserialize_coinbase_payload(&coinbase.payload)?.miner_data;
        let mergeset_non_daa = self.storage.daa_store.get_mergeset_non_daa(block_hash).unwrap();
        let expected_coinbase = self
            .services
            .coinbase_manager
            .expected_coinbase_transaction(miner_data, ghostdag_data, mergeset_rewards, &mergeset_non_daa)
            .unwrap()
            .tx;
        if hashing::tx::hash(coinbase) != hashing::tx::hash(&expected_coinbase) {
            Err(RuleError::BadCoinbaseTransaction)
        } else {
            Ok(())
        }
    }

    /// Attempts to populate the transaction with UTXO entries and performs
    /// all utxo-related tx validations
    pub(super) fn validate_transaction_in_utxo_context<'a>(
        &self,
        transaction: &'a Transaction,
        utxo_view: &impl UtxoView,
        pov_daa_score: u64,
        pov_past_median_time: u64,
        flags: TxValidationFlags,
    ) -> TxResult<ValidatedTransaction<'a>> {
        let mut entries = Vec::with_capacity(transaction.inputs.len());
        for input in transaction.inputs.iter() {
            if let Some(entry) = utxo_view.get(&input.previous_outpoint) {
                entries.push(entry);
            } else {
                // Missing at least one input. We report this as a single miss
                // and avoid collecting all possible misses.
                return Err(TxRuleError::MissingTxOutpoints);
            }
        }
        let populated_tx = PopulatedTransaction::new(transaction, entries);
        let calculated_fee = self.services.transaction_validator.validate_populated_transaction_and_get_fee(
            &populated_tx,
            pov_daa_score,
            pov_past_median_time,
            flags,
        )?;
        Ok(ValidatedTransaction::new(populated_tx, calculated_fee))
    }
}

/// Calculates the accepted-ID merkle root committed by headers: the merkle
/// root over the lexicographically sorted accepted transaction IDs
pub fn calc_accepted_id_merkle_root(accepted_tx_ids: impl Iterator<Item = Hash>) -> Hash {
    let mut ids: Vec<Hash> = accepted_tx_ids.collect();
    ids.sort();
    calc_merkle_root(ids.into_iter())
}
