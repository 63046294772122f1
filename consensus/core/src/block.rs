use std::sync::Arc;

use crate::{blockstatus::BlockStatus, coinbase::MinerData, header::Header, tx::Transaction};
use kyanite_hashes::Hash;

/// A mutable block structure where header and transactions within can still be mutated.
#[derive(Debug, Clone)]
pub struct MutableBlock {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl MutableBlock {
    pub fn new(header: Header, txs: Vec<Transaction>) -> Self {
        Self { header, transactions: txs }
    }

    pub fn from_header(header: Header) -> Self {
        Self::new(header, vec![])
    }

    pub fn to_immutable(self) -> Block {
        Block::new(self.header, self.transactions)
    }
}

/// A block structure where the inner header and transactions are wrapped by Arcs for
/// cheap cloning and for cross-thread safety and immutability.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: Arc<Header>,
    pub transactions: Arc<Vec<Transaction>>,
}

impl Block {
    pub fn new(header: Header, txs: Vec<Transaction>) -> Self {
        Self { header: Arc::new(header), transactions: Arc::new(txs) }
    }

    pub fn from_arcs(header: Arc<Header>, transactions: Arc<Vec<Transaction>>) -> Self {
        Self { header, transactions }
    }

    pub fn from_header_arc(header: Arc<Header>) -> Self {
        Self { header, transactions: Arc::new(Vec::new()) }
    }

    pub fn from_header(header: Header) -> Self {
        Self { header: Arc::new(header), transactions: Arc::new(Vec::new()) }
    }

    pub fn is_header_only(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }
}

/// A block template for mining: a mutable block built over the current
/// virtual state along with the miner data it rewards
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: MutableBlock,
    pub miner_data: MinerData,
    pub selected_parent_timestamp: u64,
}

impl BlockTemplate {
    pub fn new(block: MutableBlock, miner_data: MinerData, selected_parent_timestamp: u64) -> Self {
        Self { block, miner_data, selected_parent_timestamp }
    }
}

/// Summary info for a queried block (see `ConsensusApi::get_block_info`)
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub exists: bool,
    pub block_status: Option<BlockStatus>,
    /// Whether the block lies in the future of the current header pruning point
    pub is_in_future_of_pruning_point: bool,
}

impl BlockInfo {
    pub fn nonexistent() -> Self {
        Self { exists: false, block_status: None, is_in_future_of_pruning_point: false }
    }
}
