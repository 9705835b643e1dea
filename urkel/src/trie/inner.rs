//! Inner nodes: descent, mutation, proof generation, and the 86-byte record.
//!
//! The depth bit is not stored; a child derives it from its parent during
//! descent, with the root at bit 0. An inner node may keep a single child,
//! since deletion does not re-merge paths, and both slots are null only at
//! the root of an emptied tree.

use urkel_core::{hasher, key_bit, proof::Proof, KeyPath, NodeHash};

use super::{leaf::Leaf, Node, CHILD_INNER, CHILD_LEAF, CHILD_NULL, LAST_BIT};
use crate::error::{Error, NotFound, Result};
use crate::store::FileStore;

/// Size of the on-disk inner record.
pub(crate) const INNER_SIZE: usize = 86;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Inner {
    bit: u16,
    dirty: bool,
    synced: bool,

    idx: u32,
    pos: u32,

    hash: Option<NodeHash>,

    left: Option<Node>,
    right: Option<Node>,
}

impl Inner {
    /// A fresh dirty inner node at the given depth bit.
    pub fn new(bit: u16) -> Self {
        Inner {
            bit,
            dirty: true,
            synced: true,
            idx: 0,
            pos: 0,
            hash: None,
            left: None,
            right: None,
        }
    }

    /// A clean placeholder; children materialise on first sync.
    pub fn from_position(bit: u16, idx: u32, pos: u32, hash: NodeHash) -> Self {
        Inner {
            bit,
            dirty: false,
            synced: false,
            idx,
            pos,
            hash: Some(hash),
            left: None,
            right: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn position(&self) -> (u32, u32) {
        (self.idx, self.pos)
    }

    fn child_mut(&mut self, right: bool) -> &mut Option<Node> {
        if right {
            &mut self.right
        } else {
            &mut self.left
        }
    }

    /// Read and decode the record if this node has never been materialised.
    pub fn sync(&mut self, store: &FileStore) -> Result<()> {
        if self.synced {
            return Ok(());
        }
        let mut record = [0u8; INNER_SIZE];
        let n = store.read_tree_at(self.idx, self.pos, &mut record)?;
        if n != INNER_SIZE {
            return Err(Error::corrupted(format!(
                "inner record at {}:{} is truncated ({} of {} bytes)",
                self.idx, self.pos, n, INNER_SIZE,
            )));
        }
        self.unmarshal(&record)?;
        self.synced = true;
        Ok(())
    }

    pub fn get(&mut self, store: &FileStore, key: &KeyPath) -> Result<Vec<u8>> {
        self.sync(store)?;
        let bit = self.bit;
        match self.child_mut(key_bit(key, bit as usize)) {
            None => Err(Error::NotFound(NotFound::DeadEnd { bit })),
            Some(Node::Leaf(leaf)) => {
                leaf.sync(store)?;
                if leaf.key() == key {
                    Ok(leaf.value().to_vec())
                } else {
                    Err(Error::NotFound(NotFound::Collision { bit }))
                }
            }
            Some(Node::Inner(inner)) => inner.get(store, key),
        }
    }

    pub fn put(
        &mut self,
        store: &FileStore,
        key: KeyPath,
        preimage: Vec<u8>,
        value: Vec<u8>,
    ) -> Result<()> {
        self.sync(store)?;
        self.dirty = true;
        self.hash = None;

        let bit = self.bit;
        let slot = self.child_mut(key_bit(&key, bit as usize));
        match slot {
            None => {
                *slot = Some(Node::Leaf(Box::new(Leaf::new(key, preimage, value))));
                return Ok(());
            }
            Some(Node::Inner(inner)) => return inner.put(store, key, preimage, value),
            Some(Node::Leaf(leaf)) => {
                leaf.sync(store)?;
                if *leaf.key() == key || bit == LAST_BIT {
                    // A full 256-bit path collision between distinct
                    // preimages is unreachable under BLAKE2s; at the final
                    // bit the write degrades to last-writer-wins.
                    leaf.overwrite(preimage, value);
                    return Ok(());
                }
            }
        }

        // Two keys share the path up to here: grow a branch one bit deeper
        // and reinsert both leaves. The displaced leaf was synced above, so
        // its data is in memory.
        let old = match slot.take() {
            Some(Node::Leaf(leaf)) => *leaf,
            _ => unreachable!("slot held a leaf"),
        };
        let (old_key, old_preimage, old_value) = old.into_parts();
        let mut branch = Inner::new(bit + 1);
        branch.put(store, old_key, old_preimage, old_value)?;
        branch.put(store, key, preimage, value)?;
        *slot = Some(Node::Inner(Box::new(branch)));
        Ok(())
    }

    /// Remove `key` below this node. Returns `(subtree_empty, changed)`:
    /// the first tells the parent to clear this slot, the second propagates
    /// hash invalidation.
    pub fn delete(&mut self, store: &FileStore, key: &KeyPath) -> Result<(bool, bool)> {
        self.sync(store)?;
        let bit = self.bit;
        let slot = self.child_mut(key_bit(key, bit as usize));
        let (cleared, changed) = match slot {
            None => (false, false),
            Some(Node::Leaf(leaf)) => {
                leaf.sync(store)?;
                let owned = leaf.key() == key;
                (owned, owned)
            }
            Some(Node::Inner(inner)) => inner.delete(store, key)?,
        };
        if cleared {
            *slot = None;
        }
        if changed {
            self.dirty = true;
            self.hash = None;
        }
        Ok((self.left.is_none() && self.right.is_none(), changed))
    }

    fn left_hash(&mut self) -> NodeHash {
        match &mut self.left {
            Some(node) => node.hash(),
            None => hasher::zeros_hash(),
        }
    }

    fn right_hash(&mut self) -> NodeHash {
        match &mut self.right {
            Some(node) => node.hash(),
            None => hasher::zeros_hash(),
        }
    }

    pub fn hash(&mut self) -> NodeHash {
        if let Some(hash) = self.hash {
            return hash;
        }
        // Clean nodes always carry their hash from the record that named
        // them, so reaching here means the node is dirty and its children
        // are in memory (or clean placeholders with memoised hashes).
        let left = self.left_hash();
        let right = self.right_hash();
        let hash = hasher::hash_internal(&left, &right);
        self.hash = Some(hash);
        hash
    }

    /// Descend towards `key`, pushing the off-path sibling at every level,
    /// and settle the proof's verdict at the end of the path.
    pub fn prove(&mut self, store: &FileStore, key: &KeyPath, proof: &mut Proof) -> Result<()> {
        self.sync(store)?;
        let descend_right = key_bit(key, self.bit as usize);
        let sibling = if descend_right {
            self.left_hash()
        } else {
            self.right_hash()
        };
        proof.push_sibling(sibling);

        match self.child_mut(descend_right) {
            None => {
                proof.set_dead_end();
                Ok(())
            }
            Some(Node::Leaf(leaf)) => {
                leaf.sync(store)?;
                if leaf.key() == key {
                    proof.set_member(leaf.value().to_vec());
                } else {
                    proof.set_collision(*leaf.key(), leaf.value_hash());
                }
                Ok(())
            }
            Some(Node::Inner(inner)) => inner.prove(store, key, proof),
        }
    }

    pub fn allocate(&mut self, store: &FileStore) {
        if !self.dirty {
            return;
        }
        let (idx, pos) = store.reserve_tree_offset(INNER_SIZE as u64);
        self.idx = idx;
        self.pos = pos;
        if let Some(node) = &mut self.left {
            node.allocate(store);
        }
        if let Some(node) = &mut self.right {
            node.allocate(store);
        }
    }

    /// Serialise this node at its reserved position, then its children at
    /// theirs. The walk order must match [`Inner::allocate`].
    pub fn commit(&mut self, store: &FileStore) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut record = [0u8; INNER_SIZE];
        self.marshal_to(&mut record);
        let n = store.write_tree(&record)?;
        if n != INNER_SIZE {
            return Err(Error::PartialWrite {
                expected: INNER_SIZE,
                written: n,
            });
        }
        self.dirty = false;
        if let Some(node) = &mut self.left {
            node.commit(store)?;
        }
        if let Some(node) = &mut self.right {
            node.commit(store)?;
        }
        Ok(())
    }

    /// Walk the subtree in bit order, calling `f` on every leaf. Returns
    /// `true` if the walk was stopped by the callback.
    ///
    /// Clean children materialised along the way are dropped afterwards;
    /// they reload on demand.
    pub fn iterate(
        &mut self,
        store: &FileStore,
        reverse: bool,
        f: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<bool> {
        self.sync(store)?;

        for right in [reverse, !reverse] {
            let stopped = match self.child_mut(right) {
                None => false,
                Some(Node::Leaf(leaf)) => {
                    leaf.sync(store)?;
                    f(leaf.preimage(), leaf.value())
                }
                Some(Node::Inner(inner)) => inner.iterate(store, reverse, f)?,
            };
            if stopped {
                return Ok(true);
            }
        }

        if !self.dirty {
            self.left = None;
            self.right = None;
            self.synced = false;
        }
        Ok(false)
    }

    pub fn marshal_to(&mut self, buf: &mut [u8; INNER_SIZE]) {
        let (ltype, lidx, lpos) = match &self.left {
            None => (CHILD_NULL, 0, 0),
            Some(node) => {
                let (idx, pos) = node.position();
                (node.kind_byte(), idx, pos)
            }
        };
        let (rtype, ridx, rpos) = match &self.right {
            None => (CHILD_NULL, 0, 0),
            Some(node) => {
                let (idx, pos) = node.position();
                (node.kind_byte(), idx, pos)
            }
        };
        let left_hash = self.left_hash();
        let right_hash = self.right_hash();

        buf[0] = ltype;
        buf[1] = rtype;
        buf[2..6].copy_from_slice(&lidx.to_be_bytes());
        buf[6..10].copy_from_slice(&lpos.to_be_bytes());
        buf[10..14].copy_from_slice(&ridx.to_be_bytes());
        buf[14..18].copy_from_slice(&rpos.to_be_bytes());
        buf[18..50].copy_from_slice(&left_hash);
        buf[50..82].copy_from_slice(&right_hash);
        let crc = crc32c::crc32c(&buf[..82]);
        buf[82..86].copy_from_slice(&crc.to_be_bytes());
    }

    pub fn unmarshal(&mut self, buf: &[u8; INNER_SIZE]) -> Result<()> {
        let crc = u32::from_be_bytes(buf[82..86].try_into().expect("4-byte field"));
        if crc32c::crc32c(&buf[..82]) != crc {
            return Err(Error::corrupted(format!(
                "inner record at {}:{} failed its checksum",
                self.idx, self.pos,
            )));
        }

        let lidx = u32::from_be_bytes(buf[2..6].try_into().expect("4-byte field"));
        let lpos = u32::from_be_bytes(buf[6..10].try_into().expect("4-byte field"));
        let ridx = u32::from_be_bytes(buf[10..14].try_into().expect("4-byte field"));
        let rpos = u32::from_be_bytes(buf[14..18].try_into().expect("4-byte field"));
        let left_hash: NodeHash = buf[18..50].try_into().expect("32-byte field");
        let right_hash: NodeHash = buf[50..82].try_into().expect("32-byte field");

        self.left = self.decode_child(buf[0], lidx, lpos, left_hash)?;
        self.right = self.decode_child(buf[1], ridx, rpos, right_hash)?;
        Ok(())
    }

    fn decode_child(
        &self,
        kind: u8,
        idx: u32,
        pos: u32,
        hash: NodeHash,
    ) -> Result<Option<Node>> {
        match kind {
            CHILD_NULL => Ok(None),
            CHILD_LEAF => Ok(Some(Node::Leaf(Box::new(Leaf::from_position(
                idx, pos, hash,
            ))))),
            CHILD_INNER if self.bit < LAST_BIT => Ok(Some(Node::Inner(Box::new(
                Inner::from_position(self.bit + 1, idx, pos, hash),
            )))),
            _ => Err(Error::corrupted(format!(
                "inner record at {}:{} names child type {} at bit {}",
                self.idx, self.pos, kind, self.bit,
            ))),
        }
    }
}
