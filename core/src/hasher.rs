//! BLAKE2s-256 hashing with leaf/inner domain separation.
//!
//! The value stored under a leaf is hashed before it enters the leaf digest,
//! so witnesses stay 32 bytes per leaf no matter how large the value is.

use blake2::{Blake2s256, Digest};
use lazy_static::lazy_static;

use crate::{KeyPath, NodeHash, ValueHash, INNER_DOMAIN, LEAF_DOMAIN};

lazy_static! {
    static ref ZEROS_HASH: NodeHash = {
        let mut hasher = Blake2s256::new();
        hasher.update([LEAF_DOMAIN]);
        hasher.update([0u8; 32]);
        hasher.finalize().into()
    };
}

/// The digest standing in for an empty child slot: `H(0x01 ‖ [0u8; 32])`.
///
/// It doubles as the leaf-slot digest of a dead-end proof and as the hash of
/// an empty tree.
pub fn zeros_hash() -> NodeHash {
    *ZEROS_HASH
}

/// Hash a key preimage into its 256-bit trie path.
pub fn hash_key(preimage: &[u8]) -> KeyPath {
    Blake2s256::digest(preimage).into()
}

/// Hash a value body.
pub fn hash_value(value: &[u8]) -> ValueHash {
    Blake2s256::digest(value).into()
}

/// Hash a leaf node: `H(0x01 ‖ key ‖ value_hash)`.
pub fn hash_leaf(key: &KeyPath, value_hash: &ValueHash) -> NodeHash {
    let mut hasher = Blake2s256::new();
    hasher.update([LEAF_DOMAIN]);
    hasher.update(key);
    hasher.update(value_hash);
    hasher.finalize().into()
}

/// Hash an inner node: `H(0x02 ‖ left ‖ right)`.
///
/// Null children contribute [`zeros_hash`].
pub fn hash_internal(left: &NodeHash, right: &NodeHash) -> NodeHash {
    let mut hasher = Blake2s256::new();
    hasher.update([INNER_DOMAIN]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_hash_matches_manual_digest() {
        let mut input = vec![LEAF_DOMAIN];
        input.extend_from_slice(&[0u8; 32]);
        let expected: NodeHash = Blake2s256::digest(&input).into();
        assert_eq!(zeros_hash(), expected);
        // Distinct from a leaf over a zero key and zero value hash.
        assert_ne!(zeros_hash(), hash_leaf(&[0u8; 32], &[0u8; 32]));
    }

    #[test]
    fn domains_separate_leaf_from_inner() {
        let a = [7u8; 32];
        let b = [9u8; 32];
        assert_ne!(hash_leaf(&a, &b), hash_internal(&a, &b));
    }

    #[test]
    fn key_hash_is_stable() {
        // BLAKE2s-256 of the empty string.
        assert_eq!(
            hex::encode(hash_key(b"")),
            "69217a3079908094e11121d042354a7c1f55b6482ca1a51e1b250dfd1ed0eef9",
        );
    }
}
