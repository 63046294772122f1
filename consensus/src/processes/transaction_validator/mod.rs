pub mod tx_validation_in_isolation;
pub mod tx_validation_in_utxo_context;

use std::sync::Arc;

use crate::processes::mass::MassCalculator;
use kyanite_consensus_core::script::ScriptVerifier;

/// A validator with context for all transaction validation rules
#[derive(Clone)]
pub struct TransactionValidator {
    pub(crate) coinbase_maturity: u64,
    pub(crate) max_block_mass: u64,
    pub(crate) mass_calculator: MassCalculator,
    pub(crate) script_verifier: Arc<dyn ScriptVerifier>,
}

impl TransactionValidator {
    pub fn new(
        coinbase_maturity: u64,
        max_block_mass: u64,
        mass_calculator: MassCalculator,
        script_verifier: Arc<dyn ScriptVerifier>,
    ) -> Self {
        Self { coinbase_maturity, max_block_mass, mass_calculator, script_verifier }
    }
}
