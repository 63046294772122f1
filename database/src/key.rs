use smallvec::SmallVec;
use std::fmt::{Debug, Display};

#[derive(Clone)]
pub struct DbKey {
    path: SmallVec<[u8; 36]>, // Optimized for the common case of { prefix byte || HASH (32 bytes) }
    prefix_len: usize,
}

impl DbKey {
    pub fn new<TKey>(prefix: &[u8], key: TKey) -> Self
    where
        TKey: Clone + AsRef<[u8]>,
    {
        Self { path: prefix.iter().chain(key.as_ref().iter()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The prefix is usually readable as a byte, the key part as hex
        if self.prefix_len > 0 {
            write!(f, "{}/", self.path[0])?;
        }
        f.write_str(&faster_hex::hex_string(&self.path[self.prefix_len.min(self.path.len())..]))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DatabaseStorePrefixes;
    use kyanite_hashes::Hash;

    #[test]
    fn test_key_composition() {
        let hash = Hash::from_u64_word(34567890);
        let key = DbKey::new(DatabaseStorePrefixes::Ghostdag.as_ref(), hash);
        assert_eq!(key.prefix_len(), 1);
        assert_eq!(key.as_ref()[0], DatabaseStorePrefixes::Ghostdag as u8);
        assert_eq!(&key.as_ref()[1..], hash.as_ref());

        let prefix_only = DbKey::prefix_only(DatabaseStorePrefixes::Tips.as_ref());
        assert_eq!(prefix_only.as_ref().len(), 1);

        // Display must not panic for arbitrary content
        let _ = key.to_string();
        let _ = prefix_only.to_string();
    }
}
