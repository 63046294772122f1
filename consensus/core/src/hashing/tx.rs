use super::HasherExtensions;
use crate::tx::{Transaction, TransactionId, TransactionInput, TransactionOutpoint, TransactionOutput};
use kyanite_hashes::{Hash, Hasher};

/// A bitmask defining which transaction fields we
/// want to encode and which to ignore.
type TxEncodingFlags = u8;

pub const TX_ENCODING_FULL: TxEncodingFlags = 0;
pub const TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT: TxEncodingFlags = 1;
pub const TX_ENCODING_EXCLUDE_PAYLOAD: TxEncodingFlags = 2;

/// Returns the transaction hash. Note that this is different from the transaction ID.
pub fn hash(tx: &Transaction) -> Hash {
    let mut hasher = kyanite_hashes::TransactionHash::new();
    write_transaction(&mut hasher, tx, TX_ENCODING_FULL);
    hasher.finalize()
}

/// The payload commitment carried inside the transaction: the zero hash for
/// an empty payload, a domain-separated hash of the payload bytes otherwise
pub fn payload_hash(payload: &[u8]) -> Hash {
    if payload.is_empty() {
        return Hash::default();
    }
    kyanite_hashes::PayloadHash::hash(payload)
}

/// Not intended for direct use by clients. Instead use `tx.id()`
pub(crate) fn id(tx: &Transaction) -> TransactionId {
    // Encode the transaction, replace signature scripts and payload with empty
    // blobs (coinbase excepted) and hash the result
    let encoding_flags =
        if tx.is_coinbase() { TX_ENCODING_FULL } else { TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT | TX_ENCODING_EXCLUDE_PAYLOAD };
    let mut hasher = kyanite_hashes::TransactionId::new();
    write_transaction(&mut hasher, tx, encoding_flags);
    hasher.finalize()
}

/// Write the transaction into the provided hasher according to the encoding flags
fn write_transaction<T: Hasher>(hasher: &mut T, tx: &Transaction, encoding_flags: TxEncodingFlags) {
    hasher.write_u16(tx.version).write_len(tx.inputs.len());
    for input in tx.inputs.iter() {
        write_input(hasher, input, encoding_flags);
    }

    hasher.write_len(tx.outputs.len());
    for output in tx.outputs.iter() {
        write_output(hasher, output);
    }

    hasher.write_u64(tx.lock_time).update(&tx.subnetwork_id).write_u64(tx.gas).update(tx.payload_hash);

    if encoding_flags & TX_ENCODING_EXCLUDE_PAYLOAD == TX_ENCODING_EXCLUDE_PAYLOAD {
        hasher.write_var_bytes(&[]);
    } else {
        hasher.write_var_bytes(&tx.payload);
    }
}

#[inline(always)]
fn write_input<T: Hasher>(hasher: &mut T, input: &TransactionInput, encoding_flags: TxEncodingFlags) {
    write_outpoint(hasher, &input.previous_outpoint);
    if encoding_flags & TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT == TX_ENCODING_EXCLUDE_SIGNATURE_SCRIPT {
        hasher.write_var_bytes(&[]);
    } else {
        hasher.write_var_bytes(input.signature_script.as_slice());
    }
    hasher.write_u64(input.sequence);
}

#[inline(always)]
fn write_outpoint<T: Hasher>(hasher: &mut T, outpoint: &TransactionOutpoint) {
    hasher.update(outpoint.transaction_id).write_u32(outpoint.index);
}

#[inline(always)]
fn write_output<T: Hasher>(hasher: &mut T, output: &TransactionOutput) {
    hasher.write_u64(output.value).write_u16(output.script_public_key.version).write_var_bytes(&output.script_public_key.script);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        subnets::{SUBNETWORK_ID_COINBASE, SUBNETWORK_ID_NATIVE},
        tx::ScriptPublicKey,
    };

    fn sample_tx(signature_script: Vec<u8>, payload: Vec<u8>) -> Transaction {
        Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(3.into(), 0), signature_script, 1)],
            vec![TransactionOutput::new(1000, ScriptPublicKey::new(0, vec![5, 5]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            payload,
        )
    }

    #[test]
    fn test_id_ignores_signature_script() {
        let tx1 = sample_tx(vec![1, 2, 3], vec![]);
        let tx2 = sample_tx(vec![4, 5], vec![]);
        assert_eq!(tx1.id(), tx2.id());
        assert_ne!(hash(&tx1), hash(&tx2));
    }

    #[test]
    fn test_id_excludes_payload_bytes_but_commits_via_payload_hash() {
        // The ID encoding strips the payload bytes themselves; the commitment
        // happens only through the payload_hash field
        let mut tx1 = sample_tx(vec![], vec![7, 7, 7]);
        let original_id = tx1.id();
        tx1.payload = vec![8, 8];
        tx1.finalize();
        assert_eq!(tx1.id(), original_id);

        // While two honestly-built txs with different payloads differ in ID
        let tx2 = sample_tx(vec![], vec![7, 7, 7]);
        let tx3 = sample_tx(vec![], vec![]);
        assert_ne!(tx2.id(), tx3.id());
    }

    #[test]
    fn test_coinbase_id_commits_to_payload() {
        let cb1 = Transaction::new(0, vec![], vec![], 0, SUBNETWORK_ID_COINBASE, 0, vec![1]);
        let cb2 = Transaction::new(0, vec![], vec![], 0, SUBNETWORK_ID_COINBASE, 0, vec![2]);
        assert_ne!(cb1.id(), cb2.id());
    }

    #[test]
    fn test_hash_and_id_use_distinct_domains() {
        let tx = sample_tx(vec![], vec![]);
        assert_ne!(hash(&tx), tx.id());
    }
}
