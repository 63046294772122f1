use super::block::RuleError;
use kyanite_hashes::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PruningImportError {
    #[error("the imported multiset hash was expected to be {0} and was actually {1}")]
    ImportedMultisetHashMismatch(Hash, Hash),

    #[error("the offered pruning point {0} does not match the expected pruning point {1}")]
    UnexpectedPruningPoint(Hash, Hash),

    #[error("the pruning point {0} is missing a header")]
    PruningPointHeaderMissing(Hash),

    #[error("the imported pruning point UTXO set failed to deserialize")]
    DeserializationFailure,

    #[error("pruning import data lead to validation rule error")]
    PruningImportRuleError(#[from] RuleError),
}

pub type PruningImportResult<T> = std::result::Result<T, PruningImportError>;
