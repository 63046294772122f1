//! # The kyanite consensus core
//!
//! The ledger is a block DAG ordered by the GHOSTDAG protocol. This crate
//! implements the consensus engine over it: the reachability index answering
//! ancestry queries in logarithmic time, the GHOSTDAG blue/red partition, the
//! three-checkpoint block validation pipeline (isolation → context → UTXO),
//! the virtual-block state manager with its past-UTXO diff chains, and the
//! pruning machinery.
//!
//! ## Storage invariants
//!
//! Let **B** be the set of blocks with a body entry, **R** the set with a
//! relations entry, **C** the set with a reachability entry and **H** the set
//! with a header entry. Up to transient noise during pruning:
//!
//! ```text
//! B ⊆ R ⊆ C ⊆ H
//! ```
//!
//! Any block inserted into the relations store must reference only parents
//! that are themselves already in **R**. Functions in this crate assume and
//! enforce these invariants.
//!
//! ## Concurrency
//!
//! The engine is a single logical writer: every mutating entry point runs to
//! completion under the consensus write lock and commits its staged store
//! changes in one atomic batch, so readers never observe partial effects.

pub mod consensus;
pub mod constants;
pub mod model;
pub mod pipeline;
pub mod processes;
