pub trait HasherBase {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;
}

pub trait Hasher: HasherBase + Clone + Default {
    fn finalize(self) -> crate::Hash;
    fn reset(&mut self);
    #[inline(always)]
    fn hash<A: AsRef<[u8]>>(data: A) -> crate::Hash {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

// Each hasher is a keyed blake2b-256 state over its own domain. Finalization
// applies a second keyed pass over the inner digest, making every identity in
// the system a double hash. Changing either pass is a hard fork.
blake2b_hasher! {
    struct TransactionHash => b"TransactionHash",
    struct TransactionId => b"TransactionID",
    struct PayloadHash => b"TransactionPayload",
    struct TransactionSigningHash => b"TransactionSigningHash",
    struct BlockHash => b"BlockHash",
    struct ProofOfWorkHash => b"ProofOfWorkHash",
    struct MerkleBranchHash => b"MerkleBranchHash",
    struct MuHashElementHash => b"MuHashElement",
    struct MuHashFinalizeHash => b"MuHashFinalize",
}

macro_rules! blake2b_hasher {
    ($(struct $name:ident => $domain_sep:literal),+ $(,)? ) => {$(
        #[derive(Clone)]
        pub struct $name(blake2b_simd::State);

        impl $name {
            #[inline(always)]
            pub fn new() -> Self {
                Self(
                    blake2b_simd::Params::new()
                        .hash_length(32)
                        .key($domain_sep)
                        .to_state(),
                )
            }

            pub fn write<A: AsRef<[u8]>>(&mut self, data: A) {
                self.0.update(data.as_ref());
            }

            #[inline(always)]
            pub fn finalize(self) -> crate::Hash {
                let inner = self.0.finalize();
                let outer = blake2b_simd::Params::new()
                    .hash_length(32)
                    .key($domain_sep)
                    .hash(inner.as_bytes());
                let mut out = [0u8; 32];
                out.copy_from_slice(outer.as_bytes());
                crate::Hash(out)
            }
        }
    impl_hasher!{ struct $name }
    )*};
}

macro_rules! impl_hasher {
    (struct $name:ident) => {
        impl HasherBase for $name {
            #[inline(always)]
            fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
                self.write(data);
                self
            }
        }
        impl Hasher for $name {
            #[inline(always)]
            fn finalize(self) -> crate::Hash {
                // Call the inherent method
                $name::finalize(self)
            }
            #[inline(always)]
            fn reset(&mut self) {
                *self = Self::new();
            }
        }
        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

use {blake2b_hasher, impl_hasher};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separation() {
        let data = [42u8; 64];
        assert_ne!(TransactionHash::hash(data), TransactionId::hash(data));
        assert_ne!(TransactionHash::hash(data), BlockHash::hash(data));
        assert_ne!(BlockHash::hash(data), MerkleBranchHash::hash(data));
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = BlockHash::new();
        hasher.update([1u8, 2, 3]).update([4u8, 5]);
        let incremental = hasher.finalize();
        assert_eq!(incremental, BlockHash::hash([1u8, 2, 3, 4, 5]));
    }

    #[test]
    fn test_double_hash_differs_from_single() {
        // The finalized digest must not equal the raw keyed blake2b of the data
        let data = [7u8; 32];
        let single = blake2b_simd::Params::new().hash_length(32).key(b"BlockHash").hash(&data);
        assert_ne!(BlockHash::hash(data).as_bytes(), *single.as_bytes());
    }

    #[test]
    fn test_reset() {
        let mut hasher = TransactionHash::new();
        hasher.update([9u8; 16]);
        hasher.reset();
        assert_eq!(hasher.finalize(), TransactionHash::hash([]));
    }
}
