/// Builds a fixed-width unsigned integer over little-endian u64 limbs.
/// Arithmetic panics on overflow (debug and release alike) since consensus
/// quantities must never wrap silently.
macro_rules! construct_uint {
    ($name:ident, $n_words:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub [u64; $n_words]);

        impl $name {
            pub const ZERO: Self = Self([0u64; $n_words]);
            pub const MAX: Self = Self([u64::MAX; $n_words]);
            pub const BITS: u32 = $n_words * 64;
            pub const BYTES: usize = $n_words * 8;
            pub const LIMBS: usize = $n_words;

            #[inline]
            pub const fn from_u64(word: u64) -> Self {
                let mut limbs = [0u64; $n_words];
                limbs[0] = word;
                Self(limbs)
            }

            /// Truncating conversion to u64 (returns the least significant limb)
            #[inline]
            pub const fn as_u64(self) -> u64 {
                self.0[0]
            }

            #[inline]
            pub fn is_zero(self) -> bool {
                self.0.iter().all(|&limb| limb == 0)
            }

            /// The minimal number of bits required to represent the value
            #[inline]
            pub fn bits(self) -> u32 {
                for (i, &limb) in self.0.iter().enumerate().rev() {
                    if limb != 0 {
                        return (i as u32 + 1) * 64 - limb.leading_zeros();
                    }
                }
                0
            }

            #[inline]
            pub fn bit(self, index: u32) -> bool {
                debug_assert!(index < Self::BITS);
                (self.0[(index / 64) as usize] >> (index % 64)) & 1 == 1
            }

            #[inline]
            fn set_bit(&mut self, index: u32) {
                debug_assert!(index < Self::BITS);
                self.0[(index / 64) as usize] |= 1 << (index % 64);
            }

            pub fn overflowing_add(self, other: Self) -> (Self, bool) {
                let mut limbs = [0u64; $n_words];
                let mut carry = false;
                for i in 0..$n_words {
                    let (v, c1) = self.0[i].overflowing_add(other.0[i]);
                    let (v, c2) = v.overflowing_add(carry as u64);
                    limbs[i] = v;
                    carry = c1 | c2;
                }
                (Self(limbs), carry)
            }

            pub fn overflowing_sub(self, other: Self) -> (Self, bool) {
                let mut limbs = [0u64; $n_words];
                let mut borrow = false;
                for i in 0..$n_words {
                    let (v, b1) = self.0[i].overflowing_sub(other.0[i]);
                    let (v, b2) = v.overflowing_sub(borrow as u64);
                    limbs[i] = v;
                    borrow = b1 | b2;
                }
                (Self(limbs), borrow)
            }

            pub fn overflowing_mul(self, other: Self) -> (Self, bool) {
                let mut limbs = [0u64; $n_words];
                let mut overflow = false;
                for i in 0..$n_words {
                    if self.0[i] == 0 {
                        continue;
                    }
                    let mut carry = 0u128;
                    for j in 0..$n_words {
                        if i + j >= $n_words {
                            if other.0[j] != 0 {
                                overflow = true;
                            }
                            continue;
                        }
                        let v = self.0[i] as u128 * other.0[j] as u128 + limbs[i + j] as u128 + carry;
                        limbs[i + j] = v as u64;
                        carry = v >> 64;
                    }
                    if carry != 0 {
                        overflow = true;
                    }
                }
                (Self(limbs), overflow)
            }

            pub fn checked_sub(self, other: Self) -> Option<Self> {
                let (v, borrow) = self.overflowing_sub(other);
                if borrow {
                    None
                } else {
                    Some(v)
                }
            }

            pub fn saturating_sub(self, other: Self) -> Self {
                self.checked_sub(other).unwrap_or(Self::ZERO)
            }

            pub fn div_rem(self, other: Self) -> (Self, Self) {
                assert!(!other.is_zero(), "division by zero");
                if self < other {
                    return (Self::ZERO, self);
                }
                let shift = self.bits() - other.bits();
                let mut divisor = other << (shift as usize);
                let mut quotient = Self::ZERO;
                let mut rem = self;
                for i in (0..=shift).rev() {
                    if rem >= divisor {
                        rem = rem - divisor;
                        quotient.set_bit(i);
                    }
                    divisor = divisor >> 1usize;
                }
                (quotient, rem)
            }

            pub fn from_le_bytes(bytes: [u8; $n_words * 8]) -> Self {
                let mut limbs = [0u64; $n_words];
                bytes
                    .chunks_exact(8)
                    .zip(limbs.iter_mut())
                    .for_each(|(chunk, limb)| *limb = u64::from_le_bytes(chunk.try_into().expect("exact chunk")));
                Self(limbs)
            }

            pub fn from_be_bytes(bytes: [u8; $n_words * 8]) -> Self {
                let mut limbs = [0u64; $n_words];
                bytes
                    .rchunks_exact(8)
                    .zip(limbs.iter_mut())
                    .for_each(|(chunk, limb)| *limb = u64::from_be_bytes(chunk.try_into().expect("exact chunk")));
                Self(limbs)
            }

            pub fn to_le_bytes(self) -> [u8; $n_words * 8] {
                let mut bytes = [0u8; $n_words * 8];
                self.0
                    .iter()
                    .zip(bytes.chunks_exact_mut(8))
                    .for_each(|(limb, chunk)| chunk.copy_from_slice(&limb.to_le_bytes()));
                bytes
            }

            pub fn to_be_bytes(self) -> [u8; $n_words * 8] {
                let mut bytes = [0u8; $n_words * 8];
                self.0
                    .iter()
                    .zip(bytes.rchunks_exact_mut(8))
                    .for_each(|(limb, chunk)| chunk.copy_from_slice(&limb.to_be_bytes()));
                bytes
            }
        }

        impl From<u64> for $name {
            fn from(word: u64) -> Self {
                Self::from_u64(word)
            }
        }

        impl PartialOrd for $name {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            #[inline]
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.iter().rev().cmp(other.0.iter().rev())
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;
            fn add(self, other: Self) -> Self {
                let (v, carry) = self.overflowing_add(other);
                assert!(!carry, concat!(stringify!($name), " addition overflow"));
                v
            }
        }

        impl std::ops::AddAssign for $name {
            fn add_assign(&mut self, other: Self) {
                *self = *self + other;
            }
        }

        impl std::ops::Sub for $name {
            type Output = Self;
            fn sub(self, other: Self) -> Self {
                let (v, borrow) = self.overflowing_sub(other);
                assert!(!borrow, concat!(stringify!($name), " subtraction underflow"));
                v
            }
        }

        impl std::ops::SubAssign for $name {
            fn sub_assign(&mut self, other: Self) {
                *self = *self - other;
            }
        }

        impl std::ops::Mul for $name {
            type Output = Self;
            fn mul(self, other: Self) -> Self {
                let (v, overflow) = self.overflowing_mul(other);
                assert!(!overflow, concat!(stringify!($name), " multiplication overflow"));
                v
            }
        }

        impl std::ops::Div for $name {
            type Output = Self;
            fn div(self, other: Self) -> Self {
                self.div_rem(other).0
            }
        }

        impl std::ops::Rem for $name {
            type Output = Self;
            fn rem(self, other: Self) -> Self {
                self.div_rem(other).1
            }
        }

        impl std::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                let mut limbs = [0u64; $n_words];
                for i in 0..$n_words {
                    limbs[i] = !self.0[i];
                }
                Self(limbs)
            }
        }

        impl std::ops::Shl<usize> for $name {
            type Output = Self;
            fn shl(self, shift: usize) -> Self {
                debug_assert!(shift < Self::BITS as usize);
                let mut limbs = [0u64; $n_words];
                let word_shift = shift / 64;
                let bit_shift = shift % 64;
                for i in word_shift..$n_words {
                    limbs[i] = self.0[i - word_shift] << bit_shift;
                    if bit_shift > 0 && i > word_shift {
                        limbs[i] |= self.0[i - word_shift - 1] >> (64 - bit_shift);
                    }
                }
                Self(limbs)
            }
        }

        impl std::ops::Shr<usize> for $name {
            type Output = Self;
            fn shr(self, shift: usize) -> Self {
                debug_assert!(shift < Self::BITS as usize);
                let mut limbs = [0u64; $n_words];
                let word_shift = shift / 64;
                let bit_shift = shift % 64;
                for i in word_shift..$n_words {
                    limbs[i - word_shift] = self.0[i] >> bit_shift;
                    if bit_shift > 0 && i + 1 < $n_words {
                        limbs[i - word_shift] |= self.0[i + 1] << (64 - bit_shift);
                    }
                }
                Self(limbs)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, v| acc + v)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let be = self.to_be_bytes();
                let start = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
                let mut hex = vec![0u8; (be.len() - start) * 2];
                faster_hex::hex_encode(&be[start..], &mut hex).expect("output length matches");
                f.write_str(std::str::from_utf8(&hex).expect("hex is always valid UTF-8"))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(self, f)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(&self.to_le_bytes())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct BytesVisitor;

                impl<'de> serde::de::Visitor<'de> for BytesVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        write!(formatter, "{} little-endian bytes", $n_words * 8)
                    }

                    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                        let arr = <[u8; $n_words * 8]>::try_from(v)
                            .map_err(|_| E::invalid_length(v.len(), &self))?;
                        Ok($name::from_le_bytes(arr))
                    }

                    fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                        let mut bytes = [0u8; $n_words * 8];
                        for (i, byte) in bytes.iter_mut().enumerate() {
                            *byte = seq
                                .next_element()?
                                .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                        }
                        Ok($name::from_le_bytes(bytes))
                    }
                }

                deserializer.deserialize_bytes(BytesVisitor)
            }
        }
    };
}

pub(crate) use construct_uint;
