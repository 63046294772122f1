use kyanite_consensus_core::tx::Transaction;

/// Transaction mass accounting: a coarse cost measure combining the
/// serialized size and the cost of storing/validating output scripts
#[derive(Clone)]
pub struct MassCalculator {
    mass_per_tx_byte: u64,
    mass_per_script_pub_key_byte: u64,
}

impl MassCalculator {
    pub fn new(mass_per_tx_byte: u64, mass_per_script_pub_key_byte: u64) -> Self {
        Self { mass_per_tx_byte, mass_per_script_pub_key_byte }
    }

    pub fn calc_tx_mass(&self, tx: &Transaction) -> u64 {
        let size = transaction_estimated_serialized_size(tx);
        let script_pub_key_size: u64 =
            tx.outputs.iter().map(|output| 2 /* version (u16) */ + output.script_public_key.script().len() as u64).sum();
        size * self.mass_per_tx_byte + script_pub_key_size * self.mass_per_script_pub_key_byte
    }
}

/// Returns the estimated canonical serialized size of the transaction
pub fn transaction_estimated_serialized_size(tx: &Transaction) -> u64 {
    let mut size: u64 = 0;
    size += 2; // Tx version (u16)
    size += 8; // Number of inputs (u64)
    let inputs_size: u64 = tx.inputs.iter().map(transaction_input_estimated_serialized_size).sum();
    size += inputs_size;

    size += 8; // number of outputs (u64)
    let outputs_size: u64 = tx.outputs.iter().map(|output| 8 /* value */ + 2 /* version */ + 8 /* script len */ + output.script_public_key.script().len() as u64).sum();
    size += outputs_size;

    size += 8; // lock time (u64)
    size += kyanite_consensus_core::subnets::SUBNETWORK_ID_SIZE as u64;
    size += 8; // gas (u64)
    size += kyanite_hashes::HASH_SIZE as u64; // payload hash
    size += 8; // length of the payload (u64)
    size += tx.payload.len() as u64;
    size
}

fn transaction_input_estimated_serialized_size(input: &kyanite_consensus_core::tx::TransactionInput) -> u64 {
    let mut size = 0;
    size += kyanite_hashes::HASH_SIZE as u64; // previous outpoint tx id
    size += 4; // previous outpoint index (u32)
    size += 8; // length of signature script (u64)
    size += input.signature_script.len() as u64;
    size += 8; // sequence (u64)
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyanite_consensus_core::{
        subnets::SUBNETWORK_ID_NATIVE,
        tx::{ScriptPublicKey, TransactionInput, TransactionOutpoint, TransactionOutput},
    };

    #[test]
    fn test_mass_is_monotone_in_size() {
        let calc = MassCalculator::new(1, 10);
        let small = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(1.into(), 0), vec![0; 10], 0)],
            vec![TransactionOutput::new(100, ScriptPublicKey::new(0, vec![0; 20]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let large = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(1.into(), 0), vec![0; 100], 0)],
            vec![TransactionOutput::new(100, ScriptPublicKey::new(0, vec![0; 20]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        assert!(calc.calc_tx_mass(&small) < calc.calc_tx_mass(&large));
        assert_eq!(
            transaction_estimated_serialized_size(&large) - transaction_estimated_serialized_size(&small),
            90 // The signature script delta
        );
    }

    #[test]
    fn test_script_bytes_weigh_more() {
        let calc = MassCalculator::new(1, 10);
        let with_script = Transaction::new(
            0,
            vec![],
            vec![TransactionOutput::new(100, ScriptPublicKey::new(0, vec![0; 50]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let without_script =
            Transaction::new(0, vec![], vec![TransactionOutput::new(100, ScriptPublicKey::new(0, vec![]))], 0, SUBNETWORK_ID_NATIVE, 0, vec![]);
        let delta = calc.calc_tx_mass(&with_script) - calc.calc_tx_mass(&without_script);
        // 50 bytes counted once as size and once (x10) as script cost
        assert_eq!(delta, 50 + 50 * 10);
    }
}
