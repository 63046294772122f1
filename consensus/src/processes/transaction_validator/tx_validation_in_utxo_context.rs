use super::TransactionValidator;
use kyanite_consensus_core::{
    constants::{LOCK_TIME_THRESHOLD, MAX_SOMPI, MAX_TX_IN_SEQUENCE_NUM},
    errors::tx::{TxResult, TxRuleError},
    tx::VerifiableTransaction,
};

/// A bitmask over optional validation steps
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TxValidationFlags {
    /// Perform the full validation including script verification
    Full,
    /// Perform fee and maturity validation but skip script checks. This
    /// usually means the transaction was already checked with the exact same
    /// UTXO context (e.g. the selected parent transactions when processing
    /// its chain child)
    SkipScriptChecks,
}

impl TransactionValidator {
    /// Validates the populated transaction against its UTXO context and
    /// returns the calculated fee. `pov_daa_score` is the DAA score of the
    /// accepting context, `pov_past_median_time` its past median time.
    pub fn validate_populated_transaction_and_get_fee(
        &self,
        tx: &impl VerifiableTransaction,
        pov_daa_score: u64,
        pov_past_median_time: u64,
        flags: TxValidationFlags,
    ) -> TxResult<u64> {
        self.check_transaction_coinbase_maturity(tx, pov_daa_score)?;
        let total_in = self.check_transaction_input_amounts(tx)?;
        let total_out = Self::check_transaction_output_values_in_bounds(tx)?;

        if total_in < total_out {
            return Err(TxRuleError::SpendTooHigh(total_out, total_in));
        }

        check_transaction_finalized(tx, pov_daa_score, pov_past_median_time)?;

        if flags == TxValidationFlags::Full {
            self.check_scripts(tx)?;
        }

        Ok(total_in - total_out)
    }

    fn check_transaction_coinbase_maturity(&self, tx: &impl VerifiableTransaction, pov_daa_score: u64) -> TxResult<()> {
        if let Some((index, (input, entry))) = tx
            .populated_inputs()
            .enumerate()
            .find(|(_, (_, entry))| entry.is_coinbase && entry.block_daa_score + self.coinbase_maturity > pov_daa_score)
        {
            return Err(TxRuleError::ImmatureCoinbaseSpend(
                index,
                input.previous_outpoint,
                entry.block_daa_score,
                pov_daa_score,
                self.coinbase_maturity,
            ));
        }
        Ok(())
    }

    fn check_transaction_input_amounts(&self, tx: &impl VerifiableTransaction) -> TxResult<u64> {
        let mut total: u64 = 0;
        for (_, entry) in tx.populated_inputs() {
            total = total.checked_add(entry.amount).ok_or(TxRuleError::InputAmountOverflow)?;
            if total > MAX_SOMPI {
                return Err(TxRuleError::InputAmountTooHigh);
            }
        }
        Ok(total)
    }

    fn check_transaction_output_values_in_bounds(tx: &impl VerifiableTransaction) -> TxResult<u64> {
        let mut total: u64 = 0;
        for output in tx.outputs() {
            total = total.checked_add(output.value).ok_or(TxRuleError::OutputsValueOverflow)?;
            if total > MAX_SOMPI {
                return Err(TxRuleError::TotalTxOutTooHigh);
            }
        }
        Ok(total)
    }

    fn check_scripts(&self, tx: &impl VerifiableTransaction) -> TxResult<()> {
        for (i, (_, entry)) in tx.populated_inputs().enumerate() {
            self.script_verifier.verify_script(tx.tx(), i, entry, 0).map_err(TxRuleError::SignatureInvalid)?;
        }
        Ok(())
    }
}

/// A transaction is finalized once its lock time has passed, where the
/// comparand is the DAA score for small lock-time values and the past median
/// time for wall-clock values. A transaction whose every input carries the
/// maximal sequence is finalized regardless of the lock time.
fn check_transaction_finalized(tx: &impl VerifiableTransaction, pov_daa_score: u64, pov_past_median_time: u64) -> TxResult<()> {
    let lock_time = tx.tx().lock_time;
    if lock_time == 0 {
        return Ok(());
    }

    // The lock time field is either interpreted as a DAA score or a
    // millisecond timestamp, depending on the threshold
    let comparand = if lock_time < LOCK_TIME_THRESHOLD { pov_daa_score } else { pov_past_median_time };
    if comparand >= lock_time {
        return Ok(());
    }

    // The lock time has not passed; the transaction is still acceptable if
    // every input opted out via the maximal sequence number
    if tx.inputs().iter().all(|input| input.sequence == MAX_TX_IN_SEQUENCE_NUM) {
        return Ok(());
    }

    if let Some((i, _)) = tx.inputs().iter().enumerate().find(|(_, input)| input.sequence != MAX_TX_IN_SEQUENCE_NUM) {
        return Err(TxRuleError::NotFinalized(i));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::mass::MassCalculator;
    use kyanite_consensus_core::{
        script::PermissiveScriptVerifier,
        subnets::SUBNETWORK_ID_NATIVE,
        tx::{PopulatedTransaction, ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry},
    };
    use std::sync::Arc;

    fn validator() -> TransactionValidator {
        TransactionValidator::new(100, 500_000, MassCalculator::new(1, 10), Arc::new(PermissiveScriptVerifier))
    }

    fn tx_spending(amount_in: u64, amount_out: u64, entry_daa_score: u64, is_coinbase: bool) -> (Transaction, UtxoEntry) {
        let tx = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(7.into(), 0), vec![], 0)],
            vec![TransactionOutput::new(amount_out, ScriptPublicKey::new(0, vec![1]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let entry = UtxoEntry::new(amount_in, ScriptPublicKey::new(0, vec![1]), entry_daa_score, is_coinbase);
        (tx, entry)
    }

    #[test]
    fn test_fee_calculation() {
        let (tx, entry) = tx_spending(1000, 900, 0, false);
        let populated = PopulatedTransaction::new(&tx, vec![entry]);
        let fee = validator().validate_populated_transaction_and_get_fee(&populated, 1000, 0, TxValidationFlags::Full).unwrap();
        assert_eq!(fee, 100);
    }

    #[test]
    fn test_overspend_rejected() {
        let (tx, entry) = tx_spending(900, 1000, 0, false);
        let populated = PopulatedTransaction::new(&tx, vec![entry]);
        let res = validator().validate_populated_transaction_and_get_fee(&populated, 1000, 0, TxValidationFlags::Full);
        assert!(matches!(res, Err(TxRuleError::SpendTooHigh(1000, 900))));
    }

    #[test]
    fn test_coinbase_maturity_boundary() {
        // accepting_daa_score(output) + maturity <= pov score is required
        let (tx, entry) = tx_spending(1000, 900, 50, true);
        let populated = PopulatedTransaction::new(&tx, vec![entry]);

        let res = validator().validate_populated_transaction_and_get_fee(&populated, 149, 0, TxValidationFlags::Full);
        assert!(matches!(res, Err(TxRuleError::ImmatureCoinbaseSpend(0, _, 50, 149, 100))));

        validator().validate_populated_transaction_and_get_fee(&populated, 150, 0, TxValidationFlags::Full).unwrap();
    }

    #[test]
    fn test_non_coinbase_entry_has_no_maturity() {
        let (tx, entry) = tx_spending(1000, 900, 50, false);
        let populated = PopulatedTransaction::new(&tx, vec![entry]);
        validator().validate_populated_transaction_and_get_fee(&populated, 51, 0, TxValidationFlags::Full).unwrap();
    }

    #[test]
    fn test_lock_time_semantics() {
        // DAA-score interpreted lock time
        let (mut tx, entry) = tx_spending(1000, 900, 0, false);
        tx.lock_time = 500;
        tx.finalize();
        let populated = PopulatedTransaction::new(&tx, vec![entry.clone()]);
        assert!(matches!(
            validator().validate_populated_transaction_and_get_fee(&populated, 499, 0, TxValidationFlags::Full),
            Err(TxRuleError::NotFinalized(0))
        ));
        validator().validate_populated_transaction_and_get_fee(&populated, 500, 0, TxValidationFlags::Full).unwrap();

        // Maximal sequence opts out of lock time
        let (mut tx, entry) = tx_spending(1000, 900, 0, false);
        tx.lock_time = 500;
        tx.inputs[0].sequence = MAX_TX_IN_SEQUENCE_NUM;
        tx.finalize();
        let populated = PopulatedTransaction::new(&tx, vec![entry]);
        validator().validate_populated_transaction_and_get_fee(&populated, 499, 0, TxValidationFlags::Full).unwrap();
    }
}
