//! Merkle witnesses over the trie and their verification.
//!
//! A proof records the sibling hashes met while descending towards a key's
//! slot, plus what was found there. Three verdicts exist:
//!
//! 1. [`ProofKind::Member`]: the slot holds a leaf for the queried key, and
//!    the proof carries the value body.
//! 2. [`ProofKind::Collision`]: the slot holds a leaf for a *different* key,
//!    and the proof carries that leaf's key and value hash.
//! 3. [`ProofKind::DeadEnd`]: descent ended at an empty slot.
//!
//! Verification recomputes the root from the leaf-slot digest and the
//! sibling trace, taking the left/right orientation at each level from the
//! queried key's bits. A member proof is accepted only with the member
//! verdict; collision and dead-end both witness non-membership.

use crate::{hasher, key_bit, KeyPath, NodeHash, ValueHash, KEY_BITS};

/// The verdict a proof demonstrates for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    /// The key's slot holds its leaf; the proof carries the value.
    Member = 1,
    /// The key's slot is occupied by a leaf with a different key.
    Collision = 2,
    /// The key's slot is empty.
    DeadEnd = 3,
}

impl ProofKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(ProofKind::Member),
            2 => Some(ProofKind::Collision),
            3 => Some(ProofKind::DeadEnd),
            _ => None,
        }
    }
}

/// Errors from encoding or decoding a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    /// The proof has no trace. Only the empty tree produces one, and the
    /// wire format cannot express it.
    #[error("proof has an empty trace, nothing to encode")]
    EmptyTrace,
    /// The input ended before the advertised field.
    #[error("truncated proof: wanted {wanted} more bytes, {left} left")]
    Truncated {
        /// Bytes the next field requires.
        wanted: usize,
        /// Bytes remaining in the input.
        left: usize,
    },
    /// The kind byte is not one of the three verdicts.
    #[error("unknown proof kind {0}")]
    UnknownKind(u8),
    /// The sibling mask marks entries beyond the trace depth.
    #[error("sibling mask marks entries beyond the trace depth")]
    MaskOverflow,
    /// A collision proof must carry a 32-byte value hash.
    #[error("collision value hash must be 32 bytes, got {0}")]
    BadCollisionHash(usize),
    /// Input continues past the end of the proof body.
    #[error("trailing bytes after the proof body")]
    TrailingBytes,
}

/// A compact Merkle witness for one key.
///
/// Produced by the tree's proof generator and self-contained for
/// verification: given a trusted root hash and the key preimage, the holder
/// needs nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    kind: ProofKind,
    trace: Vec<NodeHash>,
    value: Option<Vec<u8>>,
    collision_key: Option<KeyPath>,
    collision_value_hash: Option<ValueHash>,
}

impl Default for Proof {
    fn default() -> Self {
        Proof::new()
    }
}

impl Proof {
    /// An empty proof, ready to be filled by the generator.
    pub fn new() -> Self {
        Proof {
            kind: ProofKind::DeadEnd,
            trace: Vec::new(),
            value: None,
            collision_key: None,
            collision_value_hash: None,
        }
    }

    /// An empty proof with room reserved for `hint` siblings.
    pub fn with_capacity(hint: usize) -> Self {
        Proof {
            trace: Vec::with_capacity(hint.min(KEY_BITS)),
            ..Proof::new()
        }
    }

    /// Clear the proof so it can be filled again.
    pub fn reset(&mut self) {
        self.kind = ProofKind::DeadEnd;
        self.trace.clear();
        self.value = None;
        self.collision_key = None;
        self.collision_value_hash = None;
    }

    /// The verdict this proof demonstrates.
    pub fn kind(&self) -> ProofKind {
        self.kind
    }

    /// The number of trie levels the proof traverses.
    pub fn depth(&self) -> usize {
        self.trace.len()
    }

    /// The proven value, present only on member proofs.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Record the sibling hash of the next level of descent.
    pub fn push_sibling(&mut self, hash: NodeHash) {
        debug_assert!(self.trace.len() < KEY_BITS);
        self.trace.push(hash);
    }

    /// Terminate the proof at the key's own leaf.
    pub fn set_member(&mut self, value: Vec<u8>) {
        self.kind = ProofKind::Member;
        self.value = Some(value);
        self.collision_key = None;
        self.collision_value_hash = None;
    }

    /// Terminate the proof at a leaf owned by a different key.
    pub fn set_collision(&mut self, key: KeyPath, value_hash: ValueHash) {
        self.kind = ProofKind::Collision;
        self.collision_key = Some(key);
        self.collision_value_hash = Some(value_hash);
        self.value = None;
    }

    /// Terminate the proof at an empty slot.
    pub fn set_dead_end(&mut self) {
        self.kind = ProofKind::DeadEnd;
        self.value = None;
        self.collision_key = None;
        self.collision_value_hash = None;
    }

    /// The digest of the slot the key resolves to, per the verdict.
    fn slot_digest(&self, key: &KeyPath) -> Option<NodeHash> {
        match self.kind {
            ProofKind::Member => {
                let value = self.value.as_ref()?;
                Some(hasher::hash_leaf(key, &hasher::hash_value(value)))
            }
            ProofKind::Collision => {
                let collision_key = self.collision_key.as_ref()?;
                let value_hash = self.collision_value_hash.as_ref()?;
                Some(hasher::hash_leaf(collision_key, value_hash))
            }
            ProofKind::DeadEnd => Some(hasher::zeros_hash()),
        }
    }

    /// Recompute the root implied by this proof for the given hashed key.
    fn root_for(&self, key: &KeyPath) -> Option<NodeHash> {
        let mut digest = self.slot_digest(key)?;
        for (bit, sibling) in self.trace.iter().enumerate().rev() {
            digest = if key_bit(key, bit) {
                hasher::hash_internal(sibling, &digest)
            } else {
                hasher::hash_internal(&digest, sibling)
            };
        }
        Some(digest)
    }

    /// Check that this proof shows `preimage` mapping to the carried value
    /// under `root`.
    pub fn verify_membership(&self, root: NodeHash, preimage: &[u8]) -> bool {
        if self.kind != ProofKind::Member {
            return false;
        }
        let key = hasher::hash_key(preimage);
        self.root_for(&key) == Some(root)
    }

    /// Check that this proof shows `preimage` having no value under `root`.
    pub fn verify_non_membership(&self, root: NodeHash, preimage: &[u8]) -> bool {
        let key = hasher::hash_key(preimage);
        match self.kind {
            ProofKind::Member => false,
            // A collision over the queried key itself would be a membership
            // witness in disguise.
            ProofKind::Collision if self.collision_key == Some(key) => false,
            ProofKind::Collision | ProofKind::DeadEnd => self.root_for(&key) == Some(root),
        }
    }

    /// Encode the proof into its compact wire format.
    ///
    /// Siblings equal to the zeros hash are elided and restored from the
    /// presence mask on decode.
    pub fn marshal(&self) -> Result<Vec<u8>, ProofError> {
        let depth = self.trace.len();
        if depth == 0 {
            return Err(ProofError::EmptyTrace);
        }
        debug_assert!(depth <= KEY_BITS);

        let zeros = hasher::zeros_hash();
        let mut out = Vec::with_capacity(2 + 32 + 32 * depth);
        out.push(self.kind as u8);
        out.push((depth - 1) as u8);

        let mask_start = out.len();
        out.extend_from_slice(&[0u8; 32]);
        for (index, sibling) in self.trace.iter().enumerate() {
            if *sibling != zeros {
                out[mask_start + index / 8] |= 1 << (index % 8);
                out.extend_from_slice(sibling);
            }
        }

        match self.kind {
            ProofKind::Member => {
                let value = self.value.as_deref().unwrap_or(&[]);
                out.extend_from_slice(&(value.len() as u32).to_be_bytes());
                out.extend_from_slice(value);
            }
            ProofKind::Collision => {
                let key = self.collision_key.unwrap_or([0u8; 32]);
                let value_hash = self.collision_value_hash.unwrap_or([0u8; 32]);
                out.extend_from_slice(&key);
                out.extend_from_slice(&(value_hash.len() as u32).to_be_bytes());
                out.extend_from_slice(&value_hash);
            }
            ProofKind::DeadEnd => {}
        }
        Ok(out)
    }

    /// Decode a proof from its wire format.
    pub fn unmarshal(buf: &[u8]) -> Result<Proof, ProofError> {
        let mut cursor = Cursor::new(buf);

        let kind_byte = cursor.take(1)?[0];
        let kind = ProofKind::from_byte(kind_byte).ok_or(ProofError::UnknownKind(kind_byte))?;
        let depth = cursor.take(1)?[0] as usize + 1;
        let mask: [u8; 32] = cursor.take(32)?.try_into().expect("take returned 32 bytes");

        for index in depth..KEY_BITS {
            if mask[index / 8] & (1 << (index % 8)) != 0 {
                return Err(ProofError::MaskOverflow);
            }
        }

        let zeros = hasher::zeros_hash();
        let mut trace = Vec::with_capacity(depth);
        for index in 0..depth {
            if mask[index / 8] & (1 << (index % 8)) != 0 {
                let sibling: NodeHash =
                    cursor.take(32)?.try_into().expect("take returned 32 bytes");
                trace.push(sibling);
            } else {
                trace.push(zeros);
            }
        }

        let mut proof = Proof {
            kind,
            trace,
            value: None,
            collision_key: None,
            collision_value_hash: None,
        };
        match kind {
            ProofKind::Member => {
                let len = u32::from_be_bytes(
                    cursor.take(4)?.try_into().expect("take returned 4 bytes"),
                ) as usize;
                proof.value = Some(cursor.take(len)?.to_vec());
            }
            ProofKind::Collision => {
                proof.collision_key =
                    Some(cursor.take(32)?.try_into().expect("take returned 32 bytes"));
                let len = u32::from_be_bytes(
                    cursor.take(4)?.try_into().expect("take returned 4 bytes"),
                ) as usize;
                if len != 32 {
                    return Err(ProofError::BadCollisionHash(len));
                }
                proof.collision_value_hash =
                    Some(cursor.take(32)?.try_into().expect("take returned 32 bytes"));
            }
            ProofKind::DeadEnd => {}
        }

        if !cursor.is_empty() {
            return Err(ProofError::TrailingBytes);
        }
        Ok(proof)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProofError> {
        if self.buf.len() < len {
            return Err(ProofError::Truncated {
                wanted: len,
                left: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sample_trace(rng: &mut StdRng, depth: usize) -> Vec<NodeHash> {
        (0..depth)
            .map(|_| {
                if rng.gen_bool(0.3) {
                    hasher::zeros_hash()
                } else {
                    rng.gen::<[u8; 32]>()
                }
            })
            .collect()
    }

    fn roundtrip(proof: &Proof) -> Proof {
        Proof::unmarshal(&proof.marshal().expect("marshal")).expect("unmarshal")
    }

    #[test]
    fn marshal_roundtrip_all_kinds() {
        fn prop(seed: u64, depth_sel: u8) -> bool {
            let mut rng = StdRng::seed_from_u64(seed);
            let depth = depth_sel as usize % KEY_BITS + 1;
            let trace = sample_trace(&mut rng, depth);

            let mut member = Proof::new();
            member.trace = trace.clone();
            member.set_member(vec![rng.gen(); rng.gen_range(0..64)]);

            let mut collision = Proof::new();
            collision.trace = trace.clone();
            collision.set_collision(rng.gen(), rng.gen());

            let mut dead_end = Proof::new();
            dead_end.trace = trace;
            dead_end.set_dead_end();

            roundtrip(&member) == member
                && roundtrip(&collision) == collision
                && roundtrip(&dead_end) == dead_end
        }
        QuickCheck::new()
            .tests(50)
            .quickcheck(prop as fn(u64, u8) -> bool);
    }

    #[test]
    fn zero_siblings_are_elided() {
        let mut proof = Proof::new();
        proof.push_sibling(hasher::zeros_hash());
        proof.push_sibling([3u8; 32]);
        proof.push_sibling(hasher::zeros_hash());
        proof.set_dead_end();

        let encoded = proof.marshal().unwrap();
        // kind + depth + mask + the one non-zero sibling.
        assert_eq!(encoded.len(), 1 + 1 + 32 + 32);
        assert_eq!(Proof::unmarshal(&encoded).unwrap(), proof);
    }

    #[test]
    fn empty_trace_refuses_to_marshal() {
        let mut proof = Proof::new();
        proof.set_dead_end();
        assert_eq!(proof.marshal(), Err(ProofError::EmptyTrace));
    }

    #[test]
    fn unmarshal_rejects_garbage() {
        assert_eq!(
            Proof::unmarshal(&[]),
            Err(ProofError::Truncated { wanted: 1, left: 0 })
        );
        assert_eq!(Proof::unmarshal(&[9, 0]), Err(ProofError::UnknownKind(9)));

        let mut proof = Proof::new();
        proof.push_sibling([1u8; 32]);
        proof.set_dead_end();
        let mut encoded = proof.marshal().unwrap();

        // A mask bit beyond the single-level trace.
        encoded[2 + 1] |= 1;
        assert_eq!(Proof::unmarshal(&encoded), Err(ProofError::MaskOverflow));
        encoded[2 + 1] &= !1;

        encoded.push(0);
        assert_eq!(Proof::unmarshal(&encoded), Err(ProofError::TrailingBytes));
        encoded.pop();

        encoded.truncate(encoded.len() - 1);
        assert!(matches!(
            Proof::unmarshal(&encoded),
            Err(ProofError::Truncated { .. })
        ));
    }

    #[test]
    fn single_level_membership_verifies() {
        // Hand-build a one-level tree with the key's leaf under the root.
        let preimage = b"single-level";
        let key = hasher::hash_key(preimage);

        let value = b"the-value".to_vec();
        let leaf = hasher::hash_leaf(&key, &hasher::hash_value(&value));
        let sibling = [5u8; 32];
        let root = if key_bit(&key, 0) {
            hasher::hash_internal(&sibling, &leaf)
        } else {
            hasher::hash_internal(&leaf, &sibling)
        };

        let mut proof = Proof::new();
        proof.push_sibling(sibling);
        proof.set_member(value);

        assert!(proof.verify_membership(root, preimage));
        assert!(!proof.verify_non_membership(root, preimage));
        assert!(!proof.verify_membership([0u8; 32], preimage));
        assert!(!proof.verify_membership(root, b"some-other-key"));
    }

    #[test]
    fn collision_over_queried_key_is_rejected() {
        let preimage = b"present";
        let key = hasher::hash_key(preimage);
        let value_hash = hasher::hash_value(b"v");
        let leaf = hasher::hash_leaf(&key, &value_hash);
        let sibling = hasher::zeros_hash();
        let root = if key_bit(&key, 0) {
            hasher::hash_internal(&sibling, &leaf)
        } else {
            hasher::hash_internal(&leaf, &sibling)
        };

        let mut proof = Proof::new();
        proof.push_sibling(sibling);
        proof.set_collision(key, value_hash);

        // The trace folds to the root, but the verdict is a lie.
        assert!(!proof.verify_non_membership(root, preimage));
    }
}
