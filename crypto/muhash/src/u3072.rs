use crate::ELEMENT_BYTE_SIZE;
use std::ops::{DivAssign, MulAssign};

pub(crate) type Limb = u64;
pub(crate) type DoubleLimb = u128;

const LIMB_SIZE_BYTES: usize = std::mem::size_of::<Limb>();
const LIMB_SIZE: usize = LIMB_SIZE_BYTES * 8;
pub const LIMBS: usize = ELEMENT_BYTE_SIZE / LIMB_SIZE_BYTES;

/// The field modulus is 2^3072 - PRIME_DIFF (the largest 3072-bit prime)
pub const PRIME_DIFF: Limb = 1103717;

/// A member of the multiplicative group of GF(2^3072 - PRIME_DIFF).
/// Kept reduced below 2^3072 but possibly above the modulus; `full_reduce`
/// folds the `[p, 2^3072)` range back when exactness is required.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct U3072 {
    limbs: [Limb; LIMBS],
}

impl U3072 {
    #[inline(always)]
    pub const fn zero() -> Self {
        Self { limbs: [0; LIMBS] }
    }

    #[inline(always)]
    pub const fn one() -> Self {
        let mut s = Self::zero();
        s.limbs[0] = 1;
        s
    }

    /// Checks whether the value lies in `[p, 2^3072)`
    #[inline(always)]
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        if self.limbs[0] <= Limb::MAX - PRIME_DIFF {
            return false;
        }
        self.limbs[1..].iter().all(|&limb| limb == Limb::MAX)
    }

    #[inline(always)]
    pub fn from_le_bytes(bytes: [u8; ELEMENT_BYTE_SIZE]) -> Self {
        let mut res = Self::zero();
        bytes.chunks_exact(LIMB_SIZE_BYTES).zip(res.limbs.iter_mut()).for_each(|(chunk, limb)| {
            *limb = Limb::from_le_bytes(chunk.try_into().expect("exact chunk"));
        });
        res
    }

    #[inline(always)]
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; ELEMENT_BYTE_SIZE] {
        let mut res = [0u8; ELEMENT_BYTE_SIZE];
        self.limbs.iter().zip(res.chunks_exact_mut(LIMB_SIZE_BYTES)).for_each(|(limb, chunk)| {
            chunk.copy_from_slice(&limb.to_le_bytes());
        });
        res
    }

    /// Maps a value in `[p, 2^3072)` to its canonical representative by
    /// adding PRIME_DIFF and dropping the 2^3072 carry
    #[inline(always)]
    fn full_reduce(&mut self) {
        let mut carry = PRIME_DIFF as DoubleLimb;
        for limb in &mut self.limbs {
            let v = *limb as DoubleLimb + carry;
            *limb = v as Limb;
            carry = v >> LIMB_SIZE;
        }
    }

    /// Modular multiplication: schoolbook product into a double-width buffer,
    /// then repeated folding of the high half via 2^3072 ≡ PRIME_DIFF (mod p)
    fn mul(&mut self, other: &U3072) {
        let mut wide = [0 as Limb; 2 * LIMBS];
        for i in 0..LIMBS {
            if self.limbs[i] == 0 {
                continue;
            }
            let mut carry: DoubleLimb = 0;
            for j in 0..LIMBS {
                let v = self.limbs[i] as DoubleLimb * other.limbs[j] as DoubleLimb + wide[i + j] as DoubleLimb + carry;
                wide[i + j] = v as Limb;
                carry = v >> LIMB_SIZE;
            }
            // The carry slot is untouched by previous rows, so plain store is exact
            wide[i + LIMBS] = carry as Limb;
        }

        // Fold high*PRIME_DIFF into low until the high half clears.
        // Each fold shrinks the high half by ~3050 bits, so this loop runs at most thrice.
        while wide[LIMBS..].iter().any(|&limb| limb != 0) {
            let mut folded = [0 as Limb; 2 * LIMBS];
            let mut carry: DoubleLimb = 0;
            for j in 0..LIMBS {
                let v = wide[LIMBS + j] as DoubleLimb * PRIME_DIFF as DoubleLimb + carry;
                folded[j] = v as Limb;
                carry = v >> LIMB_SIZE;
            }
            folded[LIMBS] = carry as Limb;

            carry = 0;
            for j in 0..LIMBS {
                let v = folded[j] as DoubleLimb + wide[j] as DoubleLimb + carry;
                folded[j] = v as Limb;
                carry = v >> LIMB_SIZE;
            }
            let mut j = LIMBS;
            while carry != 0 {
                let v = folded[j] as DoubleLimb + carry;
                folded[j] = v as Limb;
                carry = v >> LIMB_SIZE;
                j += 1;
            }
            wide = folded;
        }

        self.limbs.copy_from_slice(&wide[..LIMBS]);
        if self.is_overflow() {
            self.full_reduce();
        }
    }

    /// Multiplicative inverse by Fermat's little theorem: x^(p-2) mod p.
    /// The exponent 2^3072 - 1103719 has all bits set from 21 upward and the
    /// bit pattern of 993433 below.
    #[must_use]
    fn inverse(&self) -> Self {
        const EXPONENT_TAIL: u32 = 993433; // (2^21 - 1) - (1103719 - 1)
        let mut base = *self;
        if base.is_overflow() {
            base.full_reduce();
        }
        // Zero has no inverse; 0/x is defined as 0
        if base == Self::zero() {
            return base;
        }
        // One is its own inverse, and is by far the most common divisor
        // (normalizing a set whose removals were already cancelled out)
        if base == Self::one() {
            return base;
        }
        let mut result = Self::one();
        for i in (0..crate::ELEMENT_BIT_SIZE as u32).rev() {
            let squared = {
                let mut r = result;
                r.mul(&result);
                r
            };
            result = squared;
            let bit = if i >= 21 { true } else { (EXPONENT_TAIL >> i) & 1 == 1 };
            if bit {
                result.mul(&base);
            }
        }
        debug_assert!({
            let mut check = result;
            check.mul(&base);
            check == Self::one()
        });
        result
    }

    fn div(&mut self, other: &Self) {
        let inv = other.inverse();
        if self.is_overflow() {
            self.full_reduce();
        }
        self.mul(&inv);
        if self.is_overflow() {
            self.full_reduce();
        }
    }
}

impl DivAssign for U3072 {
    #[inline(always)]
    fn div_assign(&mut self, rhs: Self) {
        self.div(&rhs);
    }
}

impl MulAssign for U3072 {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Self) {
        self.mul(&rhs);
    }
}

impl Default for U3072 {
    #[inline(always)]
    fn default() -> Self {
        Self::zero()
    }
}

impl serde::Serialize for U3072 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_le_bytes())
    }
}

impl<'de> serde::Deserialize<'de> for U3072 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BytesVisitor;

        impl<'de> serde::de::Visitor<'de> for BytesVisitor {
            type Value = U3072;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "{} little-endian bytes", ELEMENT_BYTE_SIZE)
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                let arr =
                    <[u8; ELEMENT_BYTE_SIZE]>::try_from(v).map_err(|_| E::invalid_length(v.len(), &self))?;
                Ok(U3072::from_le_bytes(arr))
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = [0u8; ELEMENT_BYTE_SIZE];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq.next_element()?.ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(U3072::from_le_bytes(bytes))
            }
        }

        deserializer.deserialize_bytes(BytesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn is_one(v: &U3072) -> bool {
        v.limbs[0] == 1 && v.limbs[1..].iter().all(|&l| l == 0)
    }

    #[test]
    fn test_mul_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..4 {
            let mut element = U3072::zero();
            rng.fill(&mut element.limbs[..]);
            let copy = element;
            element *= U3072::one();
            assert_eq!(element, copy);
        }
    }

    #[test]
    fn test_inverse() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..3 {
            let mut element = U3072::zero();
            rng.fill(&mut element.limbs[..]);
            let inv = element.inverse();
            let again = inv.inverse();
            assert_eq!(again, element);
            element.mul(&inv);
            assert!(is_one(&element));
        }
    }

    #[test]
    fn test_mul_max() {
        // (p-1)*(p-1) mod p should equal 1
        let mut max = U3072 { limbs: [Limb::MAX; LIMBS] };
        max.limbs[0] -= PRIME_DIFF;
        let copy_max = max;
        max *= copy_max;
        assert!(is_one(&max), "(p-1)*(p-1) mod p should equal 1");
    }

    #[test]
    fn test_overflow_reduction() {
        // All values in [p, 2^3072) divided by one must land on their canonical residues
        for i in [0 as Limb, 1, PRIME_DIFF / 2, PRIME_DIFF - 1] {
            let mut overflown = U3072 { limbs: [Limb::MAX; LIMBS] };
            overflown.limbs[0] = Limb::MAX - i;
            overflown /= U3072::one();
            assert_eq!(overflown.limbs[0], PRIME_DIFF - i - 1);
            assert!(overflown.limbs[1..].iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn test_mul_div() {
        const LOOPS: usize = 8;
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let list: Vec<_> = (0..LOOPS)
            .map(|_| {
                let mut element = U3072::zero();
                rng.fill(&mut element.limbs[..]);
                element
            })
            .collect();

        let mut start = U3072::one();
        for &elem in list.iter() {
            start *= elem;
        }
        assert!(!is_one(&start));

        for &elem in list.iter() {
            start /= elem;
        }
        assert!(is_one(&start));
    }

    #[test]
    fn test_zero_has_no_inverse() {
        let zero = U3072::zero();
        assert_eq!(zero.inverse(), zero);
        let mut x = U3072::one();
        x *= zero;
        assert_eq!(x, zero);
    }
}
