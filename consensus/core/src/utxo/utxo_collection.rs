use crate::tx::*;
use std::collections::HashMap;

pub type UtxoCollection = HashMap<TransactionOutpoint, UtxoEntry>;

pub trait UtxoCollectionExtensions {
    /// Checks if the `outpoint` key exists with an entry that holds `entry.block_daa_score == daa_score`
    fn contains_with_daa_score(&self, outpoint: &TransactionOutpoint, daa_score: u64) -> bool;

    /// Adds all entries from `other` to `self`.
    /// Note that this means that values from `other` might override values of `self`.
    fn add_many(&mut self, other: &Self);

    /// Removes all elements in `other` from `self`. Equivalent to `self - other` in set theory.
    fn remove_many(&mut self, other: &Self);

    /// Returns whether the intersection between the two collections is not empty
    fn intersects(&self, other: &Self) -> bool;

    /// Returns the first outpoint appearing in both collections for which
    /// `rule(outpoint, self_entry, other_entry)` holds, if any
    fn intersects_with_rule(
        &self,
        other: &Self,
        rule: impl Fn(&TransactionOutpoint, &UtxoEntry, &UtxoEntry) -> bool,
    ) -> Option<TransactionOutpoint>;
}

impl UtxoCollectionExtensions for UtxoCollection {
    fn contains_with_daa_score(&self, outpoint: &TransactionOutpoint, daa_score: u64) -> bool {
        if let Some(entry) = self.get(outpoint) {
            entry.block_daa_score == daa_score
        } else {
            false
        }
    }

    fn add_many(&mut self, other: &Self) {
        for (k, v) in other.iter() {
            self.insert(*k, v.clone());
        }
    }

    fn remove_many(&mut self, other: &Self) {
        for k in other.keys() {
            self.remove(k);
        }
    }

    fn intersects(&self, other: &Self) -> bool {
        // We prefer iterating over the smaller set
        let (keys, other) = if self.len() <= other.len() { (self.keys(), other) } else { (other.keys(), self) };
        keys.into_iter().any(|k| other.contains_key(k))
    }

    fn intersects_with_rule(
        &self,
        other: &Self,
        rule: impl Fn(&TransactionOutpoint, &UtxoEntry, &UtxoEntry) -> bool,
    ) -> Option<TransactionOutpoint> {
        for (outpoint, entry) in self.iter() {
            if let Some(other_entry) = other.get(outpoint) {
                if rule(outpoint, entry, other_entry) {
                    return Some(*outpoint);
                }
            }
        }
        None
    }
}

/// Splits `items` by `filter`: entries which exist in `filter` with the same
/// DAA score go into `intersection`, all the rest go into `remainder`.
pub fn intersection_with_remainder_having_daa_score_in_place(
    items: &UtxoCollection,
    filter: &UtxoCollection,
    intersection: &mut UtxoCollection,
    remainder: &mut UtxoCollection,
) {
    for (outpoint, entry) in items.iter() {
        if filter.contains_with_daa_score(outpoint, entry.block_daa_score) {
            intersection.insert(*outpoint, entry.clone());
        } else {
            remainder.insert(*outpoint, entry.clone());
        }
    }
}

/// Appends to `result` the entries of `items` which do not exist in `filter`
/// with the same DAA score, and to `in_both` those which do.
pub fn subtraction_with_remainder_having_daa_score_in_place(
    items: &UtxoCollection,
    filter: &UtxoCollection,
    result: &mut UtxoCollection,
    in_both: &mut UtxoCollection,
) {
    for (outpoint, entry) in items.iter() {
        if filter.contains_with_daa_score(outpoint, entry.block_daa_score) {
            in_both.insert(*outpoint, entry.clone());
        } else {
            result.insert(*outpoint, entry.clone());
        }
    }
}

/// Appends to `result` the entries of `items` which do not exist in `filter`
/// with the same DAA score.
pub fn subtraction_having_daa_score_in_place(items: &UtxoCollection, filter: &UtxoCollection, result: &mut UtxoCollection) {
    for (outpoint, entry) in items.iter() {
        if !filter.contains_with_daa_score(outpoint, entry.block_daa_score) {
            result.insert(*outpoint, entry.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(daa_score: u64) -> UtxoEntry {
        UtxoEntry { amount: 5, script_public_key: Default::default(), block_daa_score: daa_score, is_coinbase: false }
    }

    #[test]
    fn test_collection_extensions() {
        let op1 = TransactionOutpoint::new(1.into(), 0);
        let op2 = TransactionOutpoint::new(2.into(), 0);
        let op3 = TransactionOutpoint::new(3.into(), 0);

        let mut a = UtxoCollection::from([(op1, entry(10)), (op2, entry(20))]);
        let b = UtxoCollection::from([(op2, entry(20)), (op3, entry(30))]);

        assert!(a.contains_with_daa_score(&op1, 10));
        assert!(!a.contains_with_daa_score(&op1, 11));
        assert!(a.intersects(&b));

        assert_eq!(a.intersects_with_rule(&b, |_, e1, e2| e1.block_daa_score == e2.block_daa_score), Some(op2));
        assert_eq!(a.intersects_with_rule(&b, |_, _, _| false), None);

        a.add_many(&b);
        assert_eq!(a.len(), 3);
        a.remove_many(&b);
        assert_eq!(a.len(), 1);
        assert!(a.contains_key(&op1));
    }

    #[test]
    fn test_daa_score_splits() {
        let op1 = TransactionOutpoint::new(1.into(), 0);
        let op2 = TransactionOutpoint::new(2.into(), 0);

        let items = UtxoCollection::from([(op1, entry(10)), (op2, entry(20))]);
        let filter = UtxoCollection::from([(op1, entry(10)), (op2, entry(99))]);

        let (mut intersection, mut remainder) = (UtxoCollection::new(), UtxoCollection::new());
        intersection_with_remainder_having_daa_score_in_place(&items, &filter, &mut intersection, &mut remainder);
        assert!(intersection.contains_key(&op1));
        assert!(remainder.contains_key(&op2));

        let mut result = UtxoCollection::new();
        subtraction_having_daa_score_in_place(&items, &filter, &mut result);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&op2));
    }
}
