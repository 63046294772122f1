use super::HasherExtensions;
use crate::header::Header;
use kyanite_hashes::{Hash, Hasher, HasherBase};

/// Returns the header hash under the block-hash domain
pub fn hash(header: &Header) -> Hash {
    let mut hasher = kyanite_hashes::BlockHash::new();
    write_header(&mut hasher, header);
    hasher.finalize()
}

/// Returns the header hash under the PoW domain
pub fn hash_for_pow(header: &Header) -> Hash {
    let mut hasher = kyanite_hashes::ProofOfWorkHash::new();
    write_header(&mut hasher, header);
    hasher.finalize()
}

/// Writes all header fields in declared order: integers little-endian,
/// parents as a length-prefixed array. Any change here is a hard fork.
fn write_header<T: Hasher + HasherBase>(hasher: &mut T, header: &Header) {
    hasher
        .write_u16(header.version)
        .write_var_array(&header.parents)
        .update(header.hash_merkle_root)
        .update(header.accepted_id_merkle_root)
        .update(header.utxo_commitment)
        .write_u64(header.timestamp)
        .write_u32(header.bits)
        .write_u64(header.nonce);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn sample_header() -> Header {
        Header::new(1, vec![7.into(), 9.into()], 5.into(), 6.into(), 8.into(), 12345, 0x207fffff, 98765)
    }

    #[test]
    fn test_hash_commits_to_all_fields() {
        let base = sample_header();

        let mut changed = sample_header();
        changed.nonce += 1;
        changed.finalize();
        assert_ne!(base.hash, changed.hash);

        let mut changed = sample_header();
        changed.timestamp += 1;
        changed.finalize();
        assert_ne!(base.hash, changed.hash);

        let mut changed = sample_header();
        changed.parents = vec![7.into()];
        changed.finalize();
        assert_ne!(base.hash, changed.hash);

        let mut changed = sample_header();
        changed.utxo_commitment = 13.into();
        changed.finalize();
        assert_ne!(base.hash, changed.hash);
    }

    #[test]
    fn test_pow_domain_differs() {
        let header = sample_header();
        assert_ne!(hash(&header), hash_for_pow(&header));
    }
}
