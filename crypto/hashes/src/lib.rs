mod hashers;

pub use hashers::*;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash as StdHash, Hasher as StdHasher},
    str::{self, FromStr},
};

pub const HASH_SIZE: usize = 32;

/// A 32-byte opaque identifier. Bytes are interpreted as little-endian when
/// the hash is compared numerically (e.g. against a PoW target).
#[derive(Eq, Clone, Copy, Default, PartialOrd, Ord, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    #[inline(always)]
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    #[inline(always)]
    pub const fn as_bytes(self) -> [u8; HASH_SIZE] {
        self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Hash(<[u8; HASH_SIZE]>::try_from(bytes).expect("expecting a slice of length 32"))
    }

    #[inline(always)]
    /// # Panics
    /// Panics if `bytes` length is not exactly `HASH_SIZE`.
    pub fn from_le_u64(arr: [u64; 4]) -> Self {
        let mut ret = [0; HASH_SIZE];
        ret.chunks_exact_mut(8).zip(arr.iter()).for_each(|(bytes, word)| bytes.copy_from_slice(&word.to_le_bytes()));
        Hash(ret)
    }

    #[inline(always)]
    /// Creates a hash with the given u64 as its least significant word, zeros elsewhere.
    /// Handy for tests which need arbitrary distinct hashes.
    pub const fn from_u64_word(word: u64) -> Self {
        let mut bytes = [0u8; HASH_SIZE];
        let le = word.to_le_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[i] = le[i];
            i += 1;
        }
        Hash(bytes)
    }

    #[inline(always)]
    pub fn to_le_u64(self) -> [u64; 4] {
        let mut out = [0u64; 4];
        out.iter_mut()
            .zip(self.0.chunks_exact(8))
            .for_each(|(word, bytes)| *word = u64::from_le_bytes(bytes.try_into().expect("exact chunk")));
        out
    }

    #[inline(always)]
    pub fn iter_le_u64(&self) -> impl ExactSizeIterator<Item = u64> + '_ {
        self.0.chunks_exact(8).map(|chunk| u64::from_le_bytes(chunk.try_into().expect("exact chunk")))
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut hex = [0u8; HASH_SIZE * 2];
        faster_hex::hex_encode(&self.0, &mut hex).expect("The output is exactly twice the size of the input");
        f.write_str(str::from_utf8(&hex).expect("hex is always valid UTF-8"))
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Hash {
    type Err = faster_hex::Error;

    fn from_str(hash_str: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; HASH_SIZE];
        faster_hex::hex_decode(hash_str.as_bytes(), &mut bytes)?;
        Ok(Hash(bytes))
    }
}

impl From<u64> for Hash {
    fn from(word: u64) -> Self {
        Self::from_u64_word(word)
    }
}

impl AsRef<[u8]> for Hash {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = std::array::TryFromSliceError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Ok(Hash(<[u8; HASH_SIZE]>::try_from(value)?))
    }
}

/// Writes the four little-endian words. Identity hashers (see `BlockHasher`
/// in consensus-core) may keep just one of them since block hashes are
/// already uniformly distributed.
impl StdHash for Hash {
    #[inline(always)]
    fn hash<H: StdHasher>(&self, state: &mut H) {
        let mut iter = self.iter_le_u64();
        state.write_u64(iter.next().expect("hash has exactly four words"));
        state.write_u64(iter.next().expect("hash has exactly four words"));
        state.write_u64(iter.next().expect("hash has exactly four words"));
        state.write_u64(iter.next().expect("hash has exactly four words"));
    }
}

#[cfg(test)]
mod tests {
    use super::Hash;
    use std::str::FromStr;

    #[test]
    fn test_hash_basics() {
        let hash_str = "8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3af";
        let hash = Hash::from_str(hash_str).unwrap();
        assert_eq!(hash_str, hash.to_string());
        let hash2 = Hash::from_str(hash_str).unwrap();
        assert_eq!(hash, hash2);

        let hash3 = Hash::from_str("8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3ab").unwrap();
        assert_ne!(hash2, hash3);

        let odd_str = "8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3a";
        let short_str = "8e40af02265360d59f4ecf9ae9ebf8f00a3118408f5a9cdcbcc9c0f93642f3";

        assert!(Hash::from_str(odd_str).is_err());
        assert!(Hash::from_str(short_str).is_err());
    }

    #[test]
    fn test_from_le_u64() {
        let words = [1u64, 2, 3, u64::MAX];
        let hash = Hash::from_le_u64(words);
        assert_eq!(hash.to_le_u64(), words);
        assert!(hash.iter_le_u64().eq(words.iter().copied()));
    }

    #[test]
    fn test_serde_round_trip() {
        let hash = Hash::from_u64_word(7777);
        let bytes = bincode::serialize(&hash).unwrap();
        let de: Hash = bincode::deserialize(&bytes).unwrap();
        assert_eq!(hash, de);
    }
}
