mod uint;

pub(crate) use uint::construct_uint;

construct_uint!(Uint192, 3);
construct_uint!(Uint256, 4);
construct_uint!(Uint320, 5);

impl From<Uint256> for Uint320 {
    fn from(u: Uint256) -> Self {
        let mut limbs = [0u64; 5];
        limbs[..4].copy_from_slice(&u.0);
        Uint320(limbs)
    }
}

impl TryFrom<Uint320> for Uint256 {
    type Error = TryFromIntError;

    fn try_from(u: Uint320) -> Result<Self, Self::Error> {
        if u.0[4] != 0 {
            Err(TryFromIntError)
        } else {
            Ok(Uint256([u.0[0], u.0[1], u.0[2], u.0[3]]))
        }
    }
}

impl From<Uint192> for Uint256 {
    fn from(u: Uint192) -> Self {
        let mut limbs = [0u64; 4];
        limbs[..3].copy_from_slice(&u.0);
        Uint256(limbs)
    }
}

impl TryFrom<Uint256> for Uint192 {
    type Error = TryFromIntError;

    fn try_from(u: Uint256) -> Result<Self, Self::Error> {
        if u.0[3] != 0 {
            Err(TryFromIntError)
        } else {
            Ok(Uint192([u.0[0], u.0[1], u.0[2]]))
        }
    }
}

/// The integer is too large to fit in the target type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFromIntError;

impl std::fmt::Display for TryFromIntError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("out of range integral type conversion attempted")
    }
}

impl std::error::Error for TryFromIntError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_arith_basics() {
        let a = Uint256::from_u64(0xdeadbeef);
        let b = Uint256::from_u64(0x1000);
        assert_eq!(a + b, Uint256::from_u64(0xdeadbeef + 0x1000));
        assert_eq!(a - b, Uint256::from_u64(0xdeadbeef - 0x1000));
        assert_eq!(a * b, Uint256::from_u64(0xdeadbeef * 0x1000));
        assert_eq!(a / b, Uint256::from_u64(0xdeadbeef / 0x1000));
        assert_eq!(a % b, Uint256::from_u64(0xdeadbeef % 0x1000));
    }

    #[test]
    fn test_carry_propagation() {
        let max_word = Uint192::from_u64(u64::MAX);
        let one = Uint192::from_u64(1);
        let sum = max_word + one;
        assert_eq!(sum.0, [0, 1, 0]);
        assert_eq!(sum - one, max_word);
        assert_eq!(max_word * max_word + (max_word + max_word), Uint192([u64::MAX, u64::MAX, 0]) * Uint192::from_u64(1));
    }

    #[test]
    fn test_shifts() {
        let x = Uint256::from_u64(1);
        assert_eq!((x << 255) >> 255, x);
        assert_eq!((x << 64).0, [0, 1, 0, 0]);
        assert_eq!((Uint256([0, 0, 0, 1]) >> 192), Uint256::from_u64(1));
    }

    #[test]
    fn test_div_rem_random(){
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..64 {
            let a = Uint256(rng.gen());
            let mut b = Uint256(rng.gen());
            b.0[2] = 0;
            b.0[3] = 0;
            if b.is_zero() {
                continue;
            }
            let q = a / b;
            let r = a % b;
            assert!(r < b);
            assert_eq!(q * b + r, a);
        }
    }

    #[test]
    fn test_ordering() {
        assert!(Uint192([0, 0, 1]) > Uint192([u64::MAX, u64::MAX, 0]));
        assert!(Uint256::from_u64(5) < Uint256::from_u64(6));
        assert_eq!(Uint256::MAX.bits(), 256);
        assert_eq!(Uint256::from_u64(1).bits(), 1);
        assert_eq!(Uint256::ZERO.bits(), 0);
    }

    #[test]
    fn test_byte_codecs() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..16 {
            let x = Uint320(rng.gen());
            assert_eq!(Uint320::from_le_bytes(x.to_le_bytes()), x);
            let mut be = x.to_be_bytes();
            be.reverse();
            assert_eq!(be, x.to_le_bytes());
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let x = Uint192([3, 1 << 62, 77]);
        let bytes = bincode::serialize(&x).unwrap();
        let de: Uint192 = bincode::deserialize(&bytes).unwrap();
        assert_eq!(x, de);
    }

    #[test]
    fn test_conversions() {
        let x = Uint256([1, 2, 3, 0]);
        let wide: Uint320 = x.into();
        assert_eq!(Uint256::try_from(wide).unwrap(), x);
        assert!(Uint256::try_from(Uint320::MAX).is_err());
        assert_eq!(Uint256::from(Uint192([9, 8, 7])).0, [9, 8, 7, 0]);
    }

    #[test]
    fn test_sum() {
        let values = [1u64, 2, 3, 4, 5];
        let total: Uint192 = values.iter().map(|&v| Uint192::from_u64(v)).sum();
        assert_eq!(total, Uint192::from_u64(15));
    }
}
