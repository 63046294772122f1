use super::TransactionValidator;
use kyanite_consensus_core::{
    constants::{MAX_SOMPI, TX_VERSION},
    errors::tx::{TxResult, TxRuleError},
    hashing,
    subnets,
    tx::Transaction,
};
use std::collections::HashSet;

impl TransactionValidator {
    /// The context-free checks a transaction must satisfy regardless of the
    /// containing block or the UTXO state
    pub fn validate_tx_in_isolation(&self, tx: &Transaction) -> TxResult<()> {
        self.check_transaction_inputs_in_isolation(tx)?;
        self.check_transaction_outputs_in_isolation(tx)?;
        check_transaction_payload(tx)?;
        check_duplicate_transaction_inputs(tx)?;
        check_gas(tx)?;
        check_transaction_version(tx)
    }

    fn check_transaction_inputs_in_isolation(&self, tx: &Transaction) -> TxResult<()> {
        if tx.is_coinbase() {
            if !tx.inputs.is_empty() {
                return Err(TxRuleError::CoinbaseHasInputs(tx.inputs.len()));
            }
        } else if tx.inputs.is_empty() {
            return Err(TxRuleError::NoTxInputs);
        }
        Ok(())
    }

    fn check_transaction_outputs_in_isolation(&self, tx: &Transaction) -> TxResult<()> {
        let mut total: u64 = 0;
        for (i, output) in tx.outputs.iter().enumerate() {
            if output.value == 0 {
                return Err(TxRuleError::TxOutZero(i));
            }
            if output.value > MAX_SOMPI {
                return Err(TxRuleError::TxOutTooHigh(i));
            }
            total = total.checked_add(output.value).ok_or(TxRuleError::OutputsValueOverflow)?;
            if total > MAX_SOMPI {
                return Err(TxRuleError::TotalTxOutTooHigh);
            }
        }
        Ok(())
    }
}

fn check_duplicate_transaction_inputs(tx: &Transaction) -> TxResult<()> {
    let mut existing = HashSet::with_capacity(tx.inputs.len());
    for input in tx.inputs.iter() {
        if !existing.insert(input.previous_outpoint) {
            return Err(TxRuleError::TxDuplicateInputs);
        }
    }
    Ok(())
}

fn check_gas(tx: &Transaction) -> TxResult<()> {
    // This should be revised if subnetworks are activated (along with other
    // validity checks for subnetwork transactions)
    if tx.subnetwork_id.is_builtin_or_native() && tx.gas > 0 {
        return Err(TxRuleError::TxHasGas);
    }
    Ok(())
}

fn check_transaction_payload(tx: &Transaction) -> TxResult<()> {
    // The payload hash must commit to the actual payload. Native
    // transactions carry no payload at all.
    if tx.subnetwork_id == subnets::SUBNETWORK_ID_NATIVE && !tx.payload.is_empty() {
        return Err(TxRuleError::WrongPayloadHash);
    }
    if tx.payload_hash != hashing::tx::payload_hash(&tx.payload) {
        return Err(TxRuleError::WrongPayloadHash);
    }
    Ok(())
}

fn check_transaction_version(tx: &Transaction) -> TxResult<()> {
    if tx.version != TX_VERSION {
        return Err(TxRuleError::UnknownTxVersion(tx.version));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::mass::MassCalculator;
    use kyanite_consensus_core::{
        script::PermissiveScriptVerifier,
        subnets::{SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE},
        tx::{ScriptPublicKey, TransactionInput, TransactionOutpoint, TransactionOutput},
    };
    use std::sync::Arc;

    fn validator() -> TransactionValidator {
        TransactionValidator::new(100, 500_000, MassCalculator::new(1, 10), Arc::new(PermissiveScriptVerifier))
    }

    fn valid_tx() -> Transaction {
        Transaction::new(
            TX_VERSION,
            vec![TransactionInput::new(TransactionOutpoint::new(1.into(), 0), vec![], 0)],
            vec![TransactionOutput::new(100, ScriptPublicKey::new(0, vec![1, 2, 3]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        )
    }

    #[test]
    fn test_valid_tx_passes() {
        validator().validate_tx_in_isolation(&valid_tx()).unwrap();
    }

    #[test]
    fn test_no_inputs_rejected() {
        let mut tx = valid_tx();
        tx.inputs.clear();
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::NoTxInputs)));
    }

    #[test]
    fn test_coinbase_with_inputs_rejected() {
        let mut tx = valid_tx();
        tx.subnetwork_id = SUBNETWORK_ID_COINBASE;
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::CoinbaseHasInputs(1))));
    }

    #[test]
    fn test_duplicate_inputs_rejected() {
        let mut tx = valid_tx();
        tx.inputs.push(tx.inputs[0].clone());
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxDuplicateInputs)));
    }

    #[test]
    fn test_output_amounts_bounded() {
        let mut tx = valid_tx();
        tx.outputs[0].value = 0;
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxOutZero(0))));

        let mut tx = valid_tx();
        tx.outputs[0].value = MAX_SOMPI + 1;
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxOutTooHigh(0))));

        let mut tx = valid_tx();
        tx.outputs[0].value = MAX_SOMPI;
        tx.outputs.push(TransactionOutput::new(1, ScriptPublicKey::new(0, vec![])));
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TotalTxOutTooHigh)));
    }

    #[test]
    fn test_gas_in_native_subnetwork_rejected() {
        let mut tx = valid_tx();
        tx.gas = 5;
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::TxHasGas)));
    }

    #[test]
    fn test_payload_hash_must_match() {
        let mut tx = valid_tx();
        tx.subnetwork_id = SUBNETWORK_ID_COINBASE;
        tx.payload = vec![1, 2, 3]; // Without recomputing payload_hash
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::WrongPayloadHash)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut tx = valid_tx();
        tx.version = TX_VERSION + 1;
        tx.finalize();
        assert!(matches!(validator().validate_tx_in_isolation(&tx), Err(TxRuleError::UnknownTxVersion(_))));
    }
}
