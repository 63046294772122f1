use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, ops::Range};

use crate::{
    hashing,
    subnets::{self, SubnetworkId},
};

/// COINBASE_TRANSACTION_INDEX is the index of the coinbase transaction in every block
pub const COINBASE_TRANSACTION_INDEX: usize = 0;

pub type TransactionId = kyanite_hashes::Hash;

pub type TransactionIndexType = u32;

/// A versioned script committing to the conditions under which an output may be spent
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ScriptPublicKey {
    pub version: u16,
    pub script: Vec<u8>,
}

impl ScriptPublicKey {
    pub fn new(version: u16, script: Vec<u8>) -> Self {
        Self { version, script }
    }

    pub fn from_vec(version: u16, script: Vec<u8>) -> Self {
        Self { version, script }
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    pub fn version(&self) -> u16 {
        self.version
    }
}

/// Holds details about an individual transaction output in a utxo
/// set such as whether or not it was contained in a coinbase tx, the daa
/// score of the block that accepts the tx, its public key script, and how
/// much it pays.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
    pub block_daa_score: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn new(amount: u64, script_public_key: ScriptPublicKey, block_daa_score: u64, is_coinbase: bool) -> Self {
        Self { amount, script_public_key, block_daa_score, is_coinbase }
    }
}

/// Represents a kyanite transaction outpoint
#[derive(Eq, Default, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: TransactionIndexType,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// Represents a kyanite transaction input.
/// The `utxo_entry` field is not part of the canonical encoding: it is
/// populated from the UTXO set during validation and carried alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    pub signature_script: Vec<u8>,
    pub sequence: u64,

    #[serde(skip)]
    #[borsh(skip)]
    pub utxo_entry: Option<UtxoEntry>,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u64) -> Self {
        Self { previous_outpoint, signature_script, sequence, utxo_entry: None }
    }
}

/// Represents a kyanite transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }
}

/// Represents a kyanite transaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: SubnetworkId,
    pub gas: u64,
    /// Commits to the payload even in encodings which strip the payload
    /// itself (see the transaction-ID encoding). Zero for an empty payload.
    pub payload_hash: TransactionId,
    pub payload: Vec<u8>,

    // A field that is used to cache the transaction ID.
    // Always use the corresponding self.id() instead of accessing this field directly
    id: TransactionId,
}

impl Transaction {
    pub fn new(
        version: u16,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        subnetwork_id: SubnetworkId,
        gas: u64,
        payload: Vec<u8>,
    ) -> Self {
        let payload_hash = hashing::tx::payload_hash(&payload);
        let mut tx = Self { version, inputs, outputs, lock_time, subnetwork_id, gas, payload_hash, payload, id: Default::default() };
        tx.finalize();
        tx
    }

    /// Determines whether or not a transaction is a coinbase transaction. A coinbase
    /// transaction is a special transaction created by miners that distributes fees and block subsidy
    /// to the previous blocks' miners, and specifies the script_public_key that will be used to pay the current
    /// miner in future blocks.
    pub fn is_coinbase(&self) -> bool {
        self.subnetwork_id == subnets::SUBNETWORK_ID_COINBASE
    }

    /// Recompute and finalize the tx id based on updated tx fields
    pub fn finalize(&mut self) {
        self.id = hashing::tx::id(self);
    }

    /// Returns the transaction ID
    pub fn id(&self) -> TransactionId {
        self.id
    }
}

/// Represents any kind of transaction which has populated UTXO entry data and can be verified
pub trait VerifiableTransaction {
    fn tx(&self) -> &Transaction;

    /// Returns the `i`'th populated input
    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry);

    /// Returns an iterator over populated `(input, entry)` pairs
    fn populated_inputs(&self) -> PopulatedInputIterator<'_, Self>
    where
        Self: Sized,
    {
        PopulatedInputIterator::new(self)
    }

    fn inputs(&self) -> &[TransactionInput] {
        &self.tx().inputs
    }

    fn outputs(&self) -> &[TransactionOutput] {
        &self.tx().outputs
    }

    fn is_coinbase(&self) -> bool {
        self.tx().is_coinbase()
    }

    fn id(&self) -> TransactionId {
        self.tx().id()
    }
}

/// A custom iterator written only so that `populated_inputs` has a known return type
/// and can be defined on the trait level
pub struct PopulatedInputIterator<'a, T: VerifiableTransaction> {
    tx: &'a T,
    r: Range<usize>,
}

impl<'a, T: VerifiableTransaction> PopulatedInputIterator<'a, T> {
    pub fn new(tx: &'a T) -> Self {
        Self { tx, r: (0..tx.inputs().len()) }
    }
}

impl<'a, T: VerifiableTransaction> Iterator for PopulatedInputIterator<'a, T> {
    type Item = (&'a TransactionInput, &'a UtxoEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.r.next().map(|i| self.tx.populated_input(i))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.r.size_hint()
    }
}

impl<'a, T: VerifiableTransaction> ExactSizeIterator for PopulatedInputIterator<'a, T> {}

/// Represents a read-only referenced transaction along with fully populated UTXO entry data
pub struct PopulatedTransaction<'a> {
    pub tx: &'a Transaction,
    pub entries: Vec<UtxoEntry>,
}

impl<'a> PopulatedTransaction<'a> {
    pub fn new(tx: &'a Transaction, entries: Vec<UtxoEntry>) -> Self {
        assert_eq!(tx.inputs.len(), entries.len());
        Self { tx, entries }
    }
}

impl<'a> VerifiableTransaction for PopulatedTransaction<'a> {
    fn tx(&self) -> &Transaction {
        self.tx
    }

    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry) {
        (&self.tx.inputs[index], &self.entries[index])
    }
}

/// Represents a validated transaction with populated UTXO entry data and a calculated fee
pub struct ValidatedTransaction<'a> {
    pub tx: &'a Transaction,
    pub entries: Vec<UtxoEntry>,
    pub calculated_fee: u64,
}

impl<'a> ValidatedTransaction<'a> {
    pub fn new(populated_tx: PopulatedTransaction<'a>, calculated_fee: u64) -> Self {
        Self { tx: populated_tx.tx, entries: populated_tx.entries, calculated_fee }
    }

    /// Coinbase transactions have no inputs to populate and carry no fee
    pub fn new_coinbase(tx: &'a Transaction) -> Self {
        assert!(tx.is_coinbase());
        Self { tx, entries: Vec::new(), calculated_fee: 0 }
    }
}

impl<'a> VerifiableTransaction for ValidatedTransaction<'a> {
    fn tx(&self) -> &Transaction {
        self.tx
    }

    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry) {
        (&self.tx.inputs[index], &self.entries[index])
    }
}

/// A mutable transaction carrying (possibly partial) populated UTXO entry data
/// and the fee calculated during validation. Used for mempool-facing flows.
#[derive(Debug, Clone)]
pub struct MutableTransaction {
    pub tx: Transaction,
    /// Populated UTXO entry data, one slot per input
    pub entries: Vec<Option<UtxoEntry>>,
    /// The calculated fee, populated by a successful validation
    pub calculated_fee: Option<u64>,
}

impl MutableTransaction {
    pub fn from_tx(tx: Transaction) -> Self {
        let entries = vec![None; tx.inputs.len()];
        Self { tx, entries, calculated_fee: None }
    }

    pub fn id(&self) -> TransactionId {
        self.tx.id()
    }

    pub fn is_fully_populated(&self) -> bool {
        self.entries.iter().all(|entry| entry.is_some())
    }

    /// Returns a verifiable view over the transaction.
    ///
    /// # Panics
    /// Panics during input iteration if some entries are missing
    pub fn as_verifiable(&self) -> MutableTransactionVerifiableWrapper<'_> {
        MutableTransactionVerifiableWrapper { inner: self }
    }
}

pub struct MutableTransactionVerifiableWrapper<'a> {
    inner: &'a MutableTransaction,
}

impl VerifiableTransaction for MutableTransactionVerifiableWrapper<'_> {
    fn tx(&self) -> &Transaction {
        &self.inner.tx
    }

    fn populated_input(&self, index: usize) -> (&TransactionInput, &UtxoEntry) {
        (
            &self.inner.tx.inputs[index],
            self.inner.entries[index].as_ref().expect("expected to be called only following full UTXO population"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coinbase_detection() {
        let coinbase = Transaction::new(0, vec![], vec![], 0, subnets::SUBNETWORK_ID_COINBASE, 0, vec![1, 2, 3]);
        assert!(coinbase.is_coinbase());
        let native = Transaction::new(0, vec![], vec![], 0, subnets::SUBNETWORK_ID_NATIVE, 0, vec![]);
        assert!(!native.is_coinbase());
    }

    #[test]
    fn test_tx_serde_round_trip() {
        let tx = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(7.into(), 1), vec![1, 2, 3], 5)],
            vec![TransactionOutput::new(1000, ScriptPublicKey::new(0, vec![9, 9]))],
            0,
            subnets::SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        let bytes = bincode::serialize(&tx).unwrap();
        let de: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tx, de);
        assert_eq!(tx.id(), de.id());
    }

    #[test]
    fn test_populated_entries_are_not_serialized() {
        let mut tx = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(7.into(), 1), vec![], 0)],
            vec![],
            0,
            subnets::SUBNETWORK_ID_NATIVE,
            0,
            vec![],
        );
        tx.inputs[0].utxo_entry = Some(UtxoEntry::new(55, ScriptPublicKey::default(), 3, false));
        let bytes = bincode::serialize(&tx).unwrap();
        let de: Transaction = bincode::deserialize(&bytes).unwrap();
        assert!(de.inputs[0].utxo_entry.is_none());
    }
}
