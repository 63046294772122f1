use crate::{
    consensus::{services::ConsensusServices, storage::ConsensusStorage},
    model::stores::{
        block_transactions::BlockTransactionsStore,
        ghostdag::GhostdagStoreReader,
        pruning::PruningStoreReader,
        statuses::{StatusesStore, StatusesStoreBatchExtensions, StatusesStoreReader},
        tips::TipsStore,
        DB,
    },
};
use kyanite_consensus_core::{
    block::Block,
    blockstatus::BlockStatus::{self, StatusHeaderOnly, StatusInvalid, StatusUTXOPendingVerification},
    config::params::Params,
    errors::block::{BlockProcessResult, RuleError},
    merkle::calc_hash_merkle_root,
    tx::{TransactionOutpoint, COINBASE_TRANSACTION_INDEX},
    BlockHashSet, HashMapCustomHasher,
};
use kyanite_database::prelude::StoreResultExtensions;
use rocksdb::WriteBatch;
use std::{collections::HashSet, sync::Arc};

pub struct BodyProcessor {
    // Config
    max_block_mass: u64,

    // DB
    db: Arc<DB>,

    // Stores and services
    storage: Arc<ConsensusStorage>,
    services: Arc<ConsensusServices>,
}

impl BodyProcessor {
    pub fn new(params: &Params, db: Arc<DB>, storage: Arc<ConsensusStorage>, services: Arc<ConsensusServices>) -> Self {
        Self { max_block_mass: params.max_block_mass, db, storage, services }
    }

    /// Validates the block body (isolation then context) and commits it with
    /// status `StatusUTXOPendingVerification`. The header is expected to have
    /// been processed already.
    pub fn process_body(&self, block: &Block) -> BlockProcessResult<BlockStatus> {
        let status = self.storage.statuses_store.read().get(block.hash()).unwrap();
        match status {
            StatusInvalid => return Err(RuleError::KnownInvalid),
            StatusHeaderOnly => {}
            // Bodies are processed only once
            status => return Ok(status),
        }

        if let Err(e) = self.validate_body_in_isolation(block) {
            self.mark_invalid(block);
            return Err(e);
        }

        if let Err(e) = self.validate_body_in_context(block) {
            // Missing parent bodies do not incriminate the block itself
            if !matches!(e, RuleError::MissingParents(_)) {
                self.mark_invalid(block);
            }
            return Err(e);
        }

        self.commit_body(block);
        Ok(StatusUTXOPendingVerification)
    }

    fn mark_invalid(&self, block: &Block) {
        self.storage.statuses_store.write().set(block.hash(), StatusInvalid).unwrap();
    }

    fn is_pruning_point(&self, hash: kyanite_hashes::Hash) -> bool {
        let pruning_read = self.storage.pruning_store.read();
        pruning_read.pruning_point().unwrap() == hash || pruning_read.importing_pruning_point().unwrap() == Some(hash)
    }

    /// The context-free body checks
    fn validate_body_in_isolation(&self, block: &Block) -> BlockProcessResult<()> {
        let txs = &block.transactions;

        if txs.is_empty() {
            return Err(RuleError::NoTransactions);
        }

        if !txs[COINBASE_TRANSACTION_INDEX].is_coinbase() {
            return Err(RuleError::FirstTxNotCoinbase);
        }

        if let Some(i) = txs[1..].iter().position(|tx| tx.is_coinbase()) {
            return Err(RuleError::MultipleCoinbases(i + 1));
        }

        // Transactions after the coinbase must be sorted by subnetwork id
        for pair in txs[1..].windows(2) {
            if pair[0].subnetwork_id > pair[1].subnetwork_id {
                return Err(RuleError::TransactionsNotSorted);
            }
        }

        let calculated = calc_hash_merkle_root(txs.iter());
        if calculated != block.header.hash_merkle_root {
            return Err(RuleError::BadMerkleRoot(block.header.hash_merkle_root, calculated));
        }

        // The coinbase payload must be well-structured
        self.services.coinbase_manager.deserialize_coinbase_payload(&txs[COINBASE_TRANSACTION_INDEX].payload)?;

        let mut total_mass: u64 = 0;
        let mut block_ids = BlockHashSet::with_capacity(txs.len());
        let mut existing_outpoints = HashSet::<TransactionOutpoint>::new();

        for tx in txs.iter() {
            if !block_ids.insert(tx.id()) {
                return Err(RuleError::DuplicateTransactions(tx.id()));
            }

            self.services
                .transaction_validator
                .validate_tx_in_isolation(tx)
                .map_err(|e| RuleError::TxInIsolationValidationFailed(tx.id(), e))?;

            total_mass += self.services.mass_calculator.calc_tx_mass(tx);
            if total_mass > self.max_block_mass {
                return Err(RuleError::ExceedsMassLimit(total_mass, self.max_block_mass));
            }

            // No outpoint may be spent twice within the same block
            for input in tx.inputs.iter() {
                if !existing_outpoints.insert(input.previous_outpoint) {
                    return Err(RuleError::DuplicateInputsInBlock(input.previous_outpoint));
                }
            }
        }

        // No transaction may spend an output created within the same block
        for tx in txs.iter() {
            for input in tx.inputs.iter() {
                if block_ids.contains(&input.previous_outpoint.transaction_id) {
                    return Err(RuleError::ChainedTransaction(input.previous_outpoint));
                }
            }
        }

        Ok(())
    }

    /// Body checks requiring the DAG context
    fn validate_body_in_context(&self, block: &Block) -> BlockProcessResult<()> {
        // All parents must have bodies before this block may have one. The
        // pruning point is exempt since its past remains header-only.
        if !self.is_pruning_point(block.hash()) {
            let statuses_read = self.storage.statuses_store.read();
            let missing: Vec<_> = block
                .header
                .parents
                .iter()
                .copied()
                .filter(|parent| {
                    let status = statuses_read.get(*parent).unwrap_option();
                    !status.is_some_and(|s| s.has_block_body())
                })
                .collect();
            drop(statuses_read);
            if !missing.is_empty() {
                return Err(RuleError::MissingParents(missing));
            }
        }

        // The coinbase payload must declare the block's own blue score
        let coinbase_data =
            self.services.coinbase_manager.deserialize_coinbase_payload(&block.transactions[COINBASE_TRANSACTION_INDEX].payload)?;
        let expected_blue_score = self.storage.ghostdag_store.get_blue_score(block.hash()).unwrap();
        if coinbase_data.blue_score != expected_blue_score {
            return Err(RuleError::BadCoinbasePayloadBlueScore(coinbase_data.blue_score, expected_blue_score));
        }

        Ok(())
    }

    /// Commits the block body atomically: stores the transactions, bumps the
    /// status and updates the DAG tips
    fn commit_body(&self, block: &Block) {
        let mut batch = WriteBatch::default();

        self.storage.block_transactions_store.insert_batch(&mut batch, block.hash(), block.transactions.clone()).unwrap();

        let mut tips_write = self.storage.tips_store.write();
        tips_write.add_tip_batch(&mut batch, block.hash(), &block.header.parents).unwrap();

        let statuses_write = self.storage.statuses_store.set_batch(&mut batch, block.hash(), StatusUTXOPendingVerification).unwrap();

        self.db.write(batch).unwrap();

        drop(statuses_write);
        drop(tips_write);
    }

    /// Commits the genesis body, initializing the tips to the genesis block
    pub fn process_genesis(&self, block: &Block) {
        let mut batch = WriteBatch::default();
        self.storage.block_transactions_store.insert_batch(&mut batch, block.hash(), block.transactions.clone()).unwrap();
        let mut tips_write = self.storage.tips_store.write();
        tips_write.init_batch(&mut batch, &[block.hash()]).unwrap();
        let statuses_write = self.storage.statuses_store.set_batch(&mut batch, block.hash(), StatusUTXOPendingVerification).unwrap();
        self.db.write(batch).unwrap();
        drop(statuses_write);
        drop(tips_write);
    }
}
