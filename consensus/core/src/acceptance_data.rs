use crate::tx::Transaction;
use kyanite_hashes::Hash;
use serde::{Deserialize, Serialize};

/// The acceptance verdicts of an accepting (chain) block: one entry per
/// merged block, ordered selected parent first and then by the canonical
/// merge-set order.
pub type AcceptanceData = Vec<BlockAcceptanceData>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAcceptanceData {
    pub block_hash: Hash,
    pub accepted_transactions: Vec<TransactionAcceptanceData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAcceptanceData {
    pub transaction: Transaction,
    pub fee: u64,
    pub is_accepted: bool,
}
