use crate::{
    hashing::HasherExtensions,
    tx::{TransactionOutpoint, UtxoEntry, VerifiableTransaction},
};
use kyanite_hashes::HasherBase;
use kyanite_muhash::MuHash;

pub trait MuHashExtensions {
    /// Folds the (populated) transaction into the multiset: spent entries are
    /// removed and created outputs are added with the given DAA score
    fn add_transaction(&mut self, tx: &impl VerifiableTransaction, block_daa_score: u64);

    /// Adds a single UTXO to the multiset
    fn add_utxo(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry);

    /// Removes a single UTXO from the multiset
    fn remove_utxo(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry);
}

impl MuHashExtensions for MuHash {
    fn add_transaction(&mut self, tx: &impl VerifiableTransaction, block_daa_score: u64) {
        for (input, entry) in tx.populated_inputs() {
            let mut writer = self.remove_element_builder();
            write_utxo(&mut writer, entry, &input.previous_outpoint);
            writer.finalize();
        }

        let tx_id = tx.id();
        let is_coinbase = tx.is_coinbase();
        for (i, output) in tx.outputs().iter().enumerate() {
            let outpoint = TransactionOutpoint::new(tx_id, i as u32);
            let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), block_daa_score, is_coinbase);
            let mut writer = self.add_element_builder();
            write_utxo(&mut writer, &entry, &outpoint);
            writer.finalize();
        }
    }

    fn add_utxo(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) {
        let mut writer = self.add_element_builder();
        write_utxo(&mut writer, entry, outpoint);
        writer.finalize();
    }

    fn remove_utxo(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) {
        let mut writer = self.remove_element_builder();
        write_utxo(&mut writer, entry, outpoint);
        writer.finalize();
    }
}

/// The canonical UTXO byte serialization committed by the multiset.
/// Any change here is a hard fork.
fn write_utxo(writer: &mut impl HasherBase, entry: &UtxoEntry, outpoint: &TransactionOutpoint) {
    writer
        // Outpoint
        .update(outpoint.transaction_id)
        .write_u32(outpoint.index)
        // Utxo entry
        .write_u64(entry.block_daa_score)
        .write_u64(entry.amount)
        .write_bool(entry.is_coinbase)
        .write_u16(entry.script_public_key.version)
        .write_var_bytes(&entry.script_public_key.script);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        subnets::SUBNETWORK_ID_COINBASE,
        tx::{ScriptPublicKey, Transaction, TransactionOutput, ValidatedTransaction},
    };
    use kyanite_muhash::empty_muhash;

    #[test]
    fn test_add_remove_utxo_cancels() {
        let outpoint = TransactionOutpoint::new(5.into(), 1);
        let entry = UtxoEntry::new(100, ScriptPublicKey::new(0, vec![1, 2]), 7, false);

        let mut mh = MuHash::new();
        mh.add_utxo(&outpoint, &entry);
        assert_ne!(mh.finalize(), empty_muhash());
        mh.remove_utxo(&outpoint, &entry);
        assert_eq!(mh.finalize(), empty_muhash());
    }

    #[test]
    fn test_add_transaction_matches_outputs() {
        let coinbase = Transaction::new(
            0,
            vec![],
            vec![TransactionOutput::new(50, ScriptPublicKey::new(0, vec![3]))],
            0,
            SUBNETWORK_ID_COINBASE,
            0,
            vec![0; 20],
        );
        let validated = ValidatedTransaction::new_coinbase(&coinbase);

        let mut via_tx = MuHash::new();
        via_tx.add_transaction(&validated, 9);

        let mut via_utxo = MuHash::new();
        let outpoint = TransactionOutpoint::new(coinbase.id(), 0);
        let entry = UtxoEntry::new(50, ScriptPublicKey::new(0, vec![3]), 9, true);
        via_utxo.add_utxo(&outpoint, &entry);

        assert_eq!(via_tx.finalize(), via_utxo.finalize());
    }
}
