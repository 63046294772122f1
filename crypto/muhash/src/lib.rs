mod u3072;

use crate::u3072::U3072;
use kyanite_hashes::{Hash, Hasher, HasherBase, MuHashElementHash, MuHashFinalizeHash};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::Display;

pub const SERIALIZED_MUHASH_SIZE: usize = ELEMENT_BYTE_SIZE;

pub(crate) const ELEMENT_BIT_SIZE: usize = 3072;
pub(crate) const ELEMENT_BYTE_SIZE: usize = ELEMENT_BIT_SIZE / 8;

/// Returns the hash of an empty multiset. Equal to the finalization of any
/// set whose every added element was also removed.
pub fn empty_muhash() -> Hash {
    MuHash::new().finalize()
}

/// A multiplicative (rolling) multiset hash. Elements can be added and removed
/// in any order, and two sets holding the same elements finalize to the same
/// hash regardless of insertion order.
///
/// Elements are hashed, expanded into a 3072-bit field member, and multiplied
/// into either a numerator (add) or a denominator (remove).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MuHash {
    numerator: U3072,
    denominator: U3072,
}

#[derive(Debug, PartialEq, Eq)]
pub struct OverflowError;

impl Display for OverflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "overflow in the MuHash field")
    }
}

impl Error for OverflowError {}

impl MuHash {
    #[inline]
    pub fn new() -> Self {
        Self { numerator: U3072::one(), denominator: U3072::one() }
    }

    /// Hashes the data and adds it to the set. Supports arbitrary length data.
    #[inline]
    pub fn add_element(&mut self, data: &[u8]) {
        let element = data_to_element(data);
        self.numerator *= element;
    }

    /// Hashes the data and removes it from the set. Supports arbitrary length data.
    #[inline]
    pub fn remove_element(&mut self, data: &[u8]) {
        let element = data_to_element(data);
        self.denominator *= element;
    }

    /// Returns a hasher whose `finalize` adds the hashed stream to the set
    #[inline]
    pub fn add_element_builder(&mut self) -> MuHashElementBuilder<'_> {
        MuHashElementBuilder::new(&mut self.numerator)
    }

    /// Returns a hasher whose `finalize` removes the hashed stream from the set
    #[inline]
    pub fn remove_element_builder(&mut self) -> MuHashElementBuilder<'_> {
        MuHashElementBuilder::new(&mut self.denominator)
    }

    /// Folds `other` into this set. Equivalent to re-playing every addition
    /// and removal performed on `other` onto `self`.
    #[inline]
    pub fn combine(&mut self, other: &Self) {
        self.numerator *= other.numerator;
        self.denominator *= other.denominator;
    }

    #[inline]
    pub fn finalize(&mut self) -> Hash {
        let serialized = self.serialize();
        MuHashFinalizeHash::hash(serialized)
    }

    #[inline]
    fn normalize(&mut self) {
        self.numerator /= self.denominator;
        self.denominator = U3072::one();
    }

    #[inline]
    pub fn serialize(&mut self) -> [u8; SERIALIZED_MUHASH_SIZE] {
        self.normalize();
        self.numerator.to_le_bytes()
    }

    #[inline]
    pub fn deserialize(data: [u8; SERIALIZED_MUHASH_SIZE]) -> Result<Self, OverflowError> {
        let numerator = U3072::from_le_bytes(data);
        if numerator.is_overflow() {
            Err(OverflowError)
        } else {
            Ok(Self { numerator, denominator: U3072::one() })
        }
    }
}

pub struct MuHashElementBuilder<'a> {
    muhash_field: &'a mut U3072,
    element_hasher: MuHashElementHash,
}

impl HasherBase for MuHashElementBuilder<'_> {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
        self.element_hasher.write(data);
        self
    }
}

impl<'a> MuHashElementBuilder<'a> {
    pub fn new(muhash_field: &'a mut U3072) -> Self {
        Self { muhash_field, element_hasher: MuHashElementHash::new() }
    }

    pub fn finalize(self) {
        let hash = self.element_hasher.finalize();
        *self.muhash_field *= expand_hash(hash);
    }
}

#[inline]
fn data_to_element(data: &[u8]) -> U3072 {
    expand_hash(MuHashElementHash::hash(data))
}

/// Expands a 32-byte seed into a uniform 3072-bit field member
#[inline]
fn expand_hash(hash: Hash) -> U3072 {
    let mut stream = ChaCha20Rng::from_seed(hash.as_bytes());
    let mut bytes = [0u8; ELEMENT_BYTE_SIZE];
    stream.fill_bytes(&mut bytes);
    U3072::from_le_bytes(bytes)
}

impl Default for MuHash {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn element_from_byte(b: u8) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0] = b;
        out
    }

    #[test]
    fn test_empty_hash_is_stable() {
        let mut empty = MuHash::new();
        assert_eq!(empty.finalize(), empty_muhash());
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..10 {
            let mut reference = None;
            let mut table = [0u8; 4];
            rng.fill(&mut table[..]);

            for order in 0..4 {
                let mut acc = MuHash::new();
                for i in 0..4 {
                    let t = table[i ^ order];
                    if (t & 4) != 0 {
                        acc.remove_element(&element_from_byte(t & 3));
                    } else {
                        acc.add_element(&element_from_byte(t & 3));
                    }
                }
                let out = acc.finalize();
                match reference {
                    None => reference = Some(out),
                    Some(expected) => assert_eq!(expected, out),
                }
            }
        }
    }

    #[test]
    fn test_add_remove_cancel() {
        const LOOPS: usize = 256;
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut set = MuHash::new();
        let list: Vec<_> = (0..LOOPS)
            .map(|_| {
                let mut data = [0u8; 100];
                rng.fill(&mut data[..]);
                set.add_element(&data);
                data
            })
            .collect();

        assert_ne!(set.finalize(), empty_muhash());

        for elem in list.iter() {
            set.remove_element(elem);
        }

        assert_eq!(set.finalize(), empty_muhash());
    }

    #[test]
    fn test_remove_before_add() {
        // Removing an element from an empty set and adding it back later must
        // cancel out, regardless of the interleaved elements
        for remove_first in 0..3u8 {
            let mut m1 = MuHash::new();
            let mut m2 = MuHash::new();
            m1.remove_element(&element_from_byte(remove_first));
            for b in 0..3u8 {
                if b != remove_first {
                    m1.add_element(&element_from_byte(b));
                    m2.add_element(&element_from_byte(b));
                }
            }
            m2.remove_element(&element_from_byte(remove_first));
            assert_eq!(m1.finalize(), m2.finalize());
        }
    }

    #[test]
    fn test_combine_matches_replay() {
        let mut m1 = MuHash::new();
        let mut m2 = MuHash::new();
        let mut replayed = MuHash::new();
        for b in 0..4u8 {
            m1.add_element(&element_from_byte(b));
            replayed.add_element(&element_from_byte(b));
        }
        for b in 4..6u8 {
            m2.remove_element(&element_from_byte(b));
            replayed.remove_element(&element_from_byte(b));
        }
        m1.combine(&m2);
        assert_eq!(m1.finalize(), replayed.finalize());
    }

    #[test]
    fn test_combine_with_inverse_is_empty() {
        let mut m1 = MuHash::new();
        let mut m2 = MuHash::new();
        for b in 0..5u8 {
            m1.add_element(&element_from_byte(b));
            m2.remove_element(&element_from_byte(b));
        }
        m1.combine(&m2);
        assert_eq!(m1.finalize(), empty_muhash());
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut check = MuHash::new();
        check.add_element(&element_from_byte(1));
        check.add_element(&element_from_byte(2));
        check.remove_element(&element_from_byte(3));
        let ser = MuHash::serialize(&mut check);

        let mut deserialized = MuHash::deserialize(ser).unwrap();
        assert_eq!(deserialized.finalize(), check.finalize());

        let overflow = [255; SERIALIZED_MUHASH_SIZE];
        assert_eq!(MuHash::deserialize(overflow).unwrap_err(), OverflowError);
    }

    #[test]
    fn test_element_builder_matches_direct() {
        let data = [13u8; 80];
        let mut direct = MuHash::new();
        direct.add_element(&data);

        let mut built = MuHash::new();
        let mut builder = built.add_element_builder();
        builder.update(&data[..40]);
        builder.update(&data[40..]);
        builder.finalize();

        assert_eq!(direct.finalize(), built.finalize());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut m = MuHash::new();
        m.add_element(&element_from_byte(9));
        let bytes = bincode::serialize(&m).unwrap();
        let mut de: MuHash = bincode::deserialize(&bytes).unwrap();
        assert_eq!(m.finalize(), de.finalize());
    }
}
