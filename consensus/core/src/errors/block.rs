use crate::{
    constants,
    errors::{coinbase::CoinbaseError, tx::TxRuleError},
    tx::{TransactionId, TransactionOutpoint},
};
use kyanite_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RuleError {
    #[error("wrong block version: got {0} but expected {}", constants::BLOCK_VERSION)]
    WrongBlockVersion(u16),

    #[error("the block timestamp is too far into the future: block timestamp is {0} but maximum timestamp allowed is {1}")]
    TimeTooFarIntoTheFuture(u64, u64),

    #[error("block has no parents")]
    NoParents,

    #[error("block has too many parents: got {0} when the limit is {1}")]
    TooManyParents(usize, usize),

    #[error("block parents are not sorted in ascending hash order")]
    ParentsNotSorted,

    #[error("block has duplicate parent {0}")]
    DuplicateParent(Hash),

    #[error("parent {0} is an ancestor of parent {1}")]
    InvalidParentsRelation(Hash, Hash),

    #[error("parent {0} is invalid")]
    InvalidParent(Hash),

    #[error("block has missing parents: {0:?}")]
    MissingParents(Vec<Hash>),

    #[error("block {0} difficulty of {1} is not the expected value of {2}")]
    UnexpectedDifficulty(Hash, u32, u32),

    #[error("the block target {0} must be strictly positive and not above the maximal allowed target")]
    TargetOutOfRange(u32),

    #[error("block timestamp of {0} is not after the past median time of {1}")]
    TimeTooOld(u64, u64),

    #[error("block is known to be invalid")]
    KnownInvalid,

    #[error("block already exists")]
    DuplicateBlock,

    #[error("block merges {0} blocks > {1} merge set size limit")]
    MergeSetTooBig(u64, u64),

    #[error("block is violating bounded merge depth")]
    ViolatingBoundedMergeDepth,

    #[error("invalid merkle root: header indicates {0} but calculated value is {1}")]
    BadMerkleRoot(Hash, Hash),

    #[error("block has no transactions")]
    NoTransactions,

    #[error("block first transaction is not coinbase")]
    FirstTxNotCoinbase,

    #[error("block has a second coinbase transaction at index {0}")]
    MultipleCoinbases(usize),

    #[error("block transactions are not sorted by subnetwork id")]
    TransactionsNotSorted,

    #[error("bad coinbase payload: {0}")]
    BadCoinbasePayload(#[from] CoinbaseError),

    #[error("coinbase blue score of {0} is not the expected value of {1}")]
    BadCoinbasePayloadBlueScore(u64, u64),

    #[error("transaction in isolation validation failed for tx {0}: {1}")]
    TxInIsolationValidationFailed(TransactionId, TxRuleError),

    #[error("block total mass {0} exceeds limit of {1}")]
    ExceedsMassLimit(u64, u64),

    #[error("outpoint {0} is spent more than once in the same block")]
    DuplicateInputsInBlock(TransactionOutpoint),

    #[error("outpoint {0} is created and spent in the same block")]
    ChainedTransaction(TransactionOutpoint),

    #[error("transaction in context validation failed for tx {0}: {1}")]
    TxInContextFailed(TransactionId, TxRuleError),

    #[error("transaction {0} is found more than once in the block")]
    DuplicateTransactions(TransactionId),

    #[error("block has invalid proof-of-work")]
    InvalidPoW,

    #[error("block {0} UTXO commitment is invalid - block header indicates {1}, but calculated value is {2}")]
    BadUTXOCommitment(Hash, Hash, Hash),

    #[error("block {0} accepted ID merkle root is invalid - block header indicates {1}, but calculated value is {2}")]
    BadAcceptedIDMerkleRoot(Hash, Hash, Hash),

    #[error("coinbase transaction is not built as expected")]
    BadCoinbaseTransaction,

    #[error("{0} non-coinbase transactions (out of {1}) are invalid in UTXO context")]
    InvalidTransactionsInUtxoContext(usize, usize),

    #[error("DAA window data has only {0} entries")]
    InsufficientDaaWindowSize(usize),

    #[error("cannot add a block body to a pruned block")]
    PrunedBlock,

    #[error("got unexpected block {0} in the current sync state")]
    UnexpectedBlockInSyncState(Hash),
}

pub type BlockProcessResult<T> = std::result::Result<T, RuleError>;
