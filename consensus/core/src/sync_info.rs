use kyanite_hashes::Hash;
use serde::{Deserialize, Serialize};

/// The block-processor synchronization states (see the orchestrator docs for
/// the transition rules between them)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncState {
    #[default]
    Normal,
    HeadersFirst,
    MissingUtxoSet,
    MissingBlockBodies,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SyncInfo {
    pub state: SyncState,
    /// The pruning point whose UTXO set is being imported, if any
    pub ibd_root_utxo_block_hash: Option<Hash>,
    pub header_count: u64,
    pub block_count: u64,
}
