mod extensions;
pub mod inquirer;
pub mod interval;
mod reindex;
pub mod tests;

use kyanite_database::prelude::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReachabilityError {
    #[error("data store error")]
    StoreError(#[from] StoreError),

    #[error("data overflow error: {0}")]
    DataOverflow(String),

    #[error("data inconsistency error: {0}")]
    DataInconsistency(String),

    #[error("query is inconsistent with the queried data")]
    BadQuery,
}

impl ReachabilityError {
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ReachabilityError::StoreError(e) if e.is_key_not_found())
    }
}

pub type Result<T> = std::result::Result<T, ReachabilityError>;
