use super::{utxo_collection::UtxoCollection, utxo_diff::ImmutableUtxoDiff};
use crate::tx::{TransactionOutpoint, UtxoEntry};

/// An abstraction for read-only queries over a UTXO collection
pub trait UtxoView {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry>;
}

impl UtxoView for UtxoCollection {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        std::collections::HashMap::get(self, outpoint).cloned()
    }
}

impl<T: UtxoView> UtxoView for &T {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        (*self).get(outpoint)
    }
}

/// Composes a UTXO view from a base UTXO view and a UTXO diff.
/// Note: can be used to compose any number of diff layers by nesting instances.
pub struct ComposedUtxoView<V: UtxoView, D: ImmutableUtxoDiff> {
    base: V,
    diff: D,
}

impl<V: UtxoView, D: ImmutableUtxoDiff> ComposedUtxoView<V, D> {
    pub fn new(base: V, diff: D) -> Self {
        Self { base, diff }
    }
}

impl<V: UtxoView, D: ImmutableUtxoDiff> UtxoView for ComposedUtxoView<V, D> {
    fn get(&self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        // First check diff added entries
        if let Some(entry) = self.diff.added().get(outpoint) {
            return Some(entry.clone());
        }
        // If not in added but in removed, then considered removed
        if self.diff.removed().contains_key(outpoint) {
            return None;
        }
        // Fallback to the base view
        self.base.get(outpoint)
    }
}

pub trait UtxoViewComposition: UtxoView + Sized {
    /// Layers `diff` on top of this view
    fn compose<D: ImmutableUtxoDiff>(self, diff: D) -> ComposedUtxoView<Self, D> {
        ComposedUtxoView::new(self, diff)
    }
}

impl<T: UtxoView + Sized> UtxoViewComposition for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tx::{ScriptPublicKey, TransactionId},
        utxo::utxo_diff::UtxoDiff,
    };

    fn entry(amount: u64) -> UtxoEntry {
        UtxoEntry::new(amount, ScriptPublicKey::default(), 0, false)
    }

    fn outpoint(id: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(TransactionId::from_u64_word(id), 0)
    }

    #[test]
    fn test_composition_layers() {
        let op1 = outpoint(1);
        let op2 = outpoint(2);
        let op3 = outpoint(3);

        let base = UtxoCollection::from([(op1, entry(10)), (op2, entry(20))]);
        let diff = UtxoDiff::new(UtxoCollection::from([(op3, entry(30))]), UtxoCollection::from([(op1, entry(10))]));

        let view = (&base).compose(&diff);
        assert_eq!(view.get(&op1), None); // removed by diff
        assert_eq!(view.get(&op2), Some(entry(20))); // from base
        assert_eq!(view.get(&op3), Some(entry(30))); // added by diff

        // Layer a second diff re-adding op1
        let second = UtxoDiff::new(UtxoCollection::from([(op1, entry(11))]), UtxoCollection::new());
        let layered = view.compose(&second);
        assert_eq!(layered.get(&op1), Some(entry(11)));
    }
}
