use super::{
    utxo_collection::*,
    utxo_error::{UtxoAlgebraError, UtxoResult},
};
use crate::tx::{TransactionOutpoint, UtxoEntry, VerifiableTransaction};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry::Vacant;

pub trait ImmutableUtxoDiff {
    fn added(&self) -> &UtxoCollection;
    fn removed(&self) -> &UtxoCollection;
}

/// The in-memory delta between two UTXO sets: applying the diff means
/// inserting every entry of `add` and deleting every entry of `remove`.
/// The two collections are kept disjoint.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoDiff {
    pub add: UtxoCollection,
    pub remove: UtxoCollection,
}

impl ImmutableUtxoDiff for UtxoDiff {
    fn added(&self) -> &UtxoCollection {
        &self.add
    }

    fn removed(&self) -> &UtxoCollection {
        &self.remove
    }
}

/// A borrowed view over a diff with its polarity reversed
pub struct ReversedUtxoDiff<'a>(&'a UtxoDiff);

impl ImmutableUtxoDiff for ReversedUtxoDiff<'_> {
    fn added(&self) -> &UtxoCollection {
        &self.0.remove
    }

    fn removed(&self) -> &UtxoCollection {
        &self.0.add
    }
}

impl<T: ImmutableUtxoDiff> ImmutableUtxoDiff for &T {
    fn added(&self) -> &UtxoCollection {
        (*self).added()
    }

    fn removed(&self) -> &UtxoCollection {
        (*self).removed()
    }
}

impl UtxoDiff {
    pub fn new(add: UtxoCollection, remove: UtxoCollection) -> Self {
        Self { add, remove }
    }

    pub fn to_reversed(self) -> Self {
        Self { add: self.remove, remove: self.add }
    }

    pub fn as_reversed(&self) -> ReversedUtxoDiff<'_> {
        ReversedUtxoDiff(self)
    }

    pub fn with_diff(&self, other: &impl ImmutableUtxoDiff) -> UtxoResult<UtxoDiff> {
        let mut clone = self.clone();
        clone.with_diff_in_place(other)?;
        Ok(clone)
    }

    /// Applies the provided diff to this diff in-place. This is equal to if the
    /// first diff, and then the second diff were applied to the same base UTXO set
    pub fn with_diff_in_place(&mut self, other: &impl ImmutableUtxoDiff) -> UtxoResult<()> {
        if let Some(offending_outpoint) =
            other.removed().intersects_with_rule(&self.remove, |outpoint: &TransactionOutpoint, entry_to_add: &UtxoEntry, _existing_entry: &UtxoEntry| {
                !self.add.contains_with_daa_score(outpoint, entry_to_add.block_daa_score)
            })
        {
            return Err(UtxoAlgebraError::DuplicateRemovePoint(offending_outpoint));
        }

        if let Some(offending_outpoint) =
            other.added().intersects_with_rule(&self.add, |outpoint: &TransactionOutpoint, _entry_to_add: &UtxoEntry, existing_entry: &UtxoEntry| {
                !other.removed().contains_with_daa_score(outpoint, existing_entry.block_daa_score)
            })
        {
            return Err(UtxoAlgebraError::DuplicateAddPoint(offending_outpoint));
        }

        let mut intersection = UtxoCollection::new();

        // If does not exist neither in `add` nor in `remove` - add to `remove`
        intersection_with_remainder_having_daa_score_in_place(other.removed(), &self.add, &mut intersection, &mut self.remove);
        // If already exists in `add` with the same DAA score - remove from `add`
        self.add.remove_many(&intersection);

        intersection.clear();

        // If does not exist neither in `add` nor in `remove`, or exists in `remove` with a different DAA score - add to `add`
        intersection_with_remainder_having_daa_score_in_place(other.added(), &self.remove, &mut intersection, &mut self.add);
        // If already exists in `remove` with the same DAA score - remove from `remove`
        self.remove.remove_many(&intersection);

        Ok(())
    }

    /// Returns a new UTXO diff with the difference between this diff and another.
    /// Assumes that:
    /// Both diffs are from the same base.
    /// If an outpoint exists in both diffs, its underlying values are the same.
    ///
    /// diff_from follows a set of rules represented by the following 3 by 3 table:
    ///
    /// ```ignore
    ///          |           |   this    |           |
    /// ---------+-----------+-----------+-----------+-----------
    ///          |           |   add     |   remove  | None
    /// ---------+-----------+-----------+-----------+-----------
    /// other    |   add     |   -       |   X       |   add
    /// ---------+-----------+-----------+-----------+-----------
    ///          |   remove  |   X       |   -       |   remove
    /// ---------+-----------+-----------+-----------+-----------
    ///          |   None    |   remove  |   add     |   -
    ///
    /// Key:
    /// -         Don't add anything to the result
    /// X         Return an error
    /// add       Add the UTXO into the add collection of the result
    /// remove    Add the UTXO into the remove collection of the result
    /// ```
    pub fn diff_from(&self, other: &UtxoDiff) -> UtxoResult<UtxoDiff> {
        // Note that the following cases are not accounted for, as they are impossible
        // as long as the base UTXO set is the same:
        // - if utxo entry is in this.add and other.remove
        // - if utxo entry is in this.remove and other.add

        let rule_not_added_output_removed_with_daa_score =
            |outpoint: &TransactionOutpoint, this_entry: &UtxoEntry, other_entry: &UtxoEntry| {
                !(other_entry.block_daa_score != this_entry.block_daa_score
                    && (self.add.contains_with_daa_score(outpoint, other_entry.block_daa_score)
                        || other.remove.contains_with_daa_score(outpoint, this_entry.block_daa_score)))
            };

        if let Some(offending_outpoint) = self.remove.intersects_with_rule(&other.add, rule_not_added_output_removed_with_daa_score)
        {
            return Err(UtxoAlgebraError::DiffIntersectionPoint(offending_outpoint, "both in self.remove and in other.add"));
        }

        let rule_not_removed_output_added_with_daa_score =
            |outpoint: &TransactionOutpoint, this_entry: &UtxoEntry, other_entry: &UtxoEntry| {
                !(other_entry.block_daa_score != this_entry.block_daa_score
                    && (self.remove.contains_with_daa_score(outpoint, other_entry.block_daa_score)
                        || other.add.contains_with_daa_score(outpoint, this_entry.block_daa_score)))
            };

        if let Some(offending_outpoint) = self.add.intersects_with_rule(&other.remove, rule_not_removed_output_added_with_daa_score)
        {
            return Err(UtxoAlgebraError::DiffIntersectionPoint(offending_outpoint, "both in self.add and in other.remove"));
        }

        // If we have the same entry in self.remove and other.remove with different
        // DAA scores - this is an error
        if let Some(offending_outpoint) =
            self.remove.intersects_with_rule(&other.remove, |_outpoint: &TransactionOutpoint, this_entry: &UtxoEntry, other_entry: &UtxoEntry| {
                other_entry.block_daa_score != this_entry.block_daa_score
            })
        {
            return Err(UtxoAlgebraError::DiffIntersectionPoint(
                offending_outpoint,
                "both in self.remove and other.remove with different DAA scores, with no corresponding entry in self.add",
            ));
        }

        let mut result = UtxoDiff::default();

        // All transactions in self.add:
        // If they are not in other.add - should be added in result.remove
        let mut in_both_to_add = UtxoCollection::new();
        subtraction_with_remainder_having_daa_score_in_place(&self.add, &other.add, &mut result.remove, &mut in_both_to_add);
        // If they are in other.remove - base utxo-set is not the same
        if in_both_to_add.intersects(&self.remove) != in_both_to_add.intersects(&other.remove) {
            return Err(UtxoAlgebraError::General(
                "diff_from: outpoint both in self.add, other.add, and only one of self.remove and other.remove",
            ));
        }

        // All transactions in other.remove:
        // If they are not in self.remove - should be added in result.remove
        subtraction_having_daa_score_in_place(&other.remove, &self.remove, &mut result.remove);

        // All transactions in self.remove:
        // If they are not in other.remove - should be added in result.add
        subtraction_having_daa_score_in_place(&self.remove, &other.remove, &mut result.add);

        // All transactions in other.add:
        // If they are not in self.add - should be added in result.add
        subtraction_having_daa_score_in_place(&other.add, &self.add, &mut result.add);

        Ok(result)
    }

    /// Folds the effect of the (populated) transaction into this diff:
    /// spent entries are removed and created outputs are added with the
    /// accepting block's DAA score
    pub fn add_transaction(&mut self, transaction: &impl VerifiableTransaction, block_daa_score: u64) -> UtxoResult<()> {
        for (input, entry) in transaction.populated_inputs() {
            self.remove_entry(&input.previous_outpoint, entry)?;
        }

        let is_coinbase = transaction.is_coinbase();
        let tx_id = transaction.id();

        for (i, output) in transaction.outputs().iter().enumerate() {
            let outpoint = TransactionOutpoint::new(tx_id, i as u32);
            let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), block_daa_score, is_coinbase);
            self.add_entry(outpoint, entry)?;
        }
        Ok(())
    }

    fn remove_entry(&mut self, outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> UtxoResult<()> {
        if self.add.contains_with_daa_score(outpoint, entry.block_daa_score) {
            self.add.remove(outpoint);
        } else if let Vacant(e) = self.remove.entry(*outpoint) {
            e.insert(entry.clone());
        } else {
            return Err(UtxoAlgebraError::DoubleRemoveCall(*outpoint));
        }
        Ok(())
    }

    fn add_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) -> UtxoResult<()> {
        if self.remove.contains_with_daa_score(&outpoint, entry.block_daa_score) {
            self.remove.remove(&outpoint);
        } else if let Vacant(e) = self.add.entry(outpoint) {
            e.insert(entry);
        } else {
            return Err(UtxoAlgebraError::DoubleAddCall(outpoint));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{ScriptPublicKey, TransactionId};

    fn entry(amount: u64, daa_score: u64) -> UtxoEntry {
        UtxoEntry::new(amount, ScriptPublicKey::default(), daa_score, false)
    }

    fn outpoint(id: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(TransactionId::from_u64_word(id), 0)
    }

    #[test]
    fn test_with_diff_composition() {
        // Applying d1 then d2 to a base must equal applying with_diff(d1, d2)
        let op1 = outpoint(1);
        let op2 = outpoint(2);

        let d1 = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::new());
        let d2 = UtxoDiff::new(UtxoCollection::from([(op2, entry(20, 1))]), UtxoCollection::from([(op1, entry(10, 0))]));

        let composed = d1.with_diff(&d2).unwrap();
        // op1 was added then removed, so it cancels; op2 remains added
        assert!(composed.add.contains_key(&op2));
        assert!(!composed.add.contains_key(&op1));
        assert!(!composed.remove.contains_key(&op1));
    }

    #[test]
    fn test_with_diff_detects_double_add() {
        let op1 = outpoint(1);
        let d1 = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::new());
        let d2 = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::new());
        assert_eq!(d1.with_diff(&d2).unwrap_err(), UtxoAlgebraError::DuplicateAddPoint(op1));
    }

    #[test]
    fn test_diff_from_round_trip() {
        // WithDiff(d, DiffFrom(a, WithDiff(a, d))) == d
        let op1 = outpoint(1);
        let op2 = outpoint(2);
        let op3 = outpoint(3);

        let a = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::from([(op2, entry(20, 0))]));
        let d = UtxoDiff::new(UtxoCollection::from([(op3, entry(30, 1))]), UtxoCollection::from([(op1, entry(10, 0))]));

        let a_with_d = a.with_diff(&d).unwrap();
        let diff = a.diff_from(&a_with_d).unwrap();
        assert_eq!(diff, d);
    }

    #[test]
    fn test_diff_from_inconsistent_base() {
        let op1 = outpoint(1);
        let this = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::new());
        let other = UtxoDiff::new(UtxoCollection::new(), UtxoCollection::from([(op1, entry(10, 0))]));
        assert!(this.diff_from(&other).is_err());
    }

    #[test]
    fn test_add_remove_disjoint() {
        // After any sequence of transaction applications, add and remove stay disjoint
        let op1 = outpoint(1);
        let mut diff = UtxoDiff::default();
        diff.add.insert(op1, entry(10, 0));
        diff.remove_entry(&op1, &entry(10, 0)).unwrap();
        assert!(diff.add.is_empty() && diff.remove.is_empty());

        diff.remove_entry(&op1, &entry(10, 0)).unwrap();
        diff.add_entry(op1, entry(10, 0)).unwrap();
        assert!(diff.add.is_empty() && diff.remove.is_empty());
    }

    #[test]
    fn test_reversed_view() {
        let op1 = outpoint(1);
        let diff = UtxoDiff::new(UtxoCollection::from([(op1, entry(10, 0))]), UtxoCollection::new());
        let reversed = diff.as_reversed();
        assert!(reversed.removed().contains_key(&op1));
        assert!(reversed.added().is_empty());
        let owned_reversed = diff.clone().to_reversed();
        assert!(owned_reversed.remove.contains_key(&op1));
    }
}
