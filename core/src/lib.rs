#![warn(missing_docs)]

//! Schema and proof verification for the urkel authenticated trie.
//!
//! This crate defines the types shared between the database and anyone
//! verifying its proofs: 256-bit hashed keys, domain-separated node hashing
//! over BLAKE2s-256, and the compact witness format. Nothing in here touches
//! storage; a verifier holding only a root hash depends on this crate alone.
//!
//! ## Schema
//!
//! Every key is addressed by the BLAKE2s-256 hash of its preimage, and the
//! trie is the 256-level binary radix trie over those bits. Bit `i` of a
//! hashed key is bit `i % 8` of byte `i / 8`, least significant first.
//!
//! Node hashes are domain-separated so a leaf can never be confused with an
//! inner node: a leaf hashes as `H(0x01 ‖ key ‖ H(value))` and an inner node
//! as `H(0x02 ‖ left ‖ right)`. An empty child slot contributes the
//! [`hasher::zeros_hash`] sentinel, the leaf-domain hash of 32 zero bytes.

use bitvec::prelude::*;

pub mod hasher;
pub mod proof;

/// The hashed key addressing a slot in the trie. All paths are 256 bits.
pub type KeyPath = [u8; 32];

/// The hash of a node. Always 256 bits.
pub type NodeHash = [u8; 32];

/// The hash of a stored value. Proofs carry this instead of the value body.
pub type ValueHash = [u8; 32];

/// The number of bits in a key path, and the deepest possible descent.
pub const KEY_BITS: usize = 256;

/// Domain tag prefixed to leaf-node hash inputs.
pub const LEAF_DOMAIN: u8 = 0x01;

/// Domain tag prefixed to inner-node hash inputs.
pub const INNER_DOMAIN: u8 = 0x02;

/// Whether bit `index` of the key path is set.
///
/// Bit order follows the key's byte order with the least significant bit of
/// each byte first, so `index` 0 is the lowest bit of byte 0.
pub fn key_bit(key: &KeyPath, index: usize) -> bool {
    key.view_bits::<Lsb0>()[index]
}
