//! Leaf nodes and their 52-byte record.
//!
//! The record points into the value stream, where the leaf's body lives as
//! `preimage ‖ value ‖ crc32c(preimage ‖ value)`. The preimage rides along
//! so iteration can hand back original keys. A leaf's hash is
//! `H(0x01 ‖ key ‖ H(value))`; it is never stored in the leaf record. The
//! parent's record carries it, so hashing a clean tree never loads values.

use urkel_core::{hasher, KeyPath, NodeHash, ValueHash};

use crate::error::{Error, Result};
use crate::store::FileStore;

/// Size of the on-disk leaf record.
pub(crate) const LEAF_SIZE: usize = 52;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Leaf {
    dirty: bool,
    synced: bool,

    idx: u32,
    pos: u32,

    key: KeyPath,
    preimage: Vec<u8>,
    value: Vec<u8>,
    preimage_len: u32,
    value_len: u32,

    value_idx: u32,
    value_pos: u32,

    hash: Option<NodeHash>,
}

impl Leaf {
    /// A fresh dirty leaf owning its data.
    pub fn new(key: KeyPath, preimage: Vec<u8>, value: Vec<u8>) -> Self {
        Leaf {
            dirty: true,
            synced: true,
            idx: 0,
            pos: 0,
            preimage_len: preimage.len() as u32,
            value_len: value.len() as u32,
            key,
            preimage,
            value,
            value_idx: 0,
            value_pos: 0,
            hash: None,
        }
    }

    /// A clean placeholder; the record and body load on first access. The
    /// hash comes from the parent's record.
    pub fn from_position(idx: u32, pos: u32, hash: NodeHash) -> Self {
        Leaf {
            dirty: false,
            synced: false,
            idx,
            pos,
            key: [0u8; 32],
            preimage: Vec::new(),
            value: Vec::new(),
            preimage_len: 0,
            value_len: 0,
            value_idx: 0,
            value_pos: 0,
            hash: Some(hash),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn position(&self) -> (u32, u32) {
        (self.idx, self.pos)
    }

    /// The hashed key. Valid once the leaf is synced.
    pub fn key(&self) -> &KeyPath {
        debug_assert!(self.synced);
        &self.key
    }

    pub fn preimage(&self) -> &[u8] {
        debug_assert!(self.synced);
        &self.preimage
    }

    pub fn value(&self) -> &[u8] {
        debug_assert!(self.synced);
        &self.value
    }

    pub fn value_hash(&self) -> ValueHash {
        debug_assert!(self.synced);
        hasher::hash_value(&self.value)
    }

    /// Tear the leaf into its hashed key, preimage, and value, for
    /// reinsertion when a branch grows underneath it.
    pub fn into_parts(self) -> (KeyPath, Vec<u8>, Vec<u8>) {
        debug_assert!(self.synced);
        (self.key, self.preimage, self.value)
    }

    /// Load the record and value body from the store, if not yet in memory.
    pub fn sync(&mut self, store: &FileStore) -> Result<()> {
        if self.synced {
            return Ok(());
        }

        let mut record = [0u8; LEAF_SIZE];
        let n = store.read_tree_at(self.idx, self.pos, &mut record)?;
        if n != LEAF_SIZE {
            return Err(Error::corrupted(format!(
                "leaf record at {}:{} is truncated ({} of {} bytes)",
                self.idx, self.pos, n, LEAF_SIZE,
            )));
        }
        self.unmarshal(&record)?;

        let body_len = self.preimage_len as usize + self.value_len as usize + 4;
        let mut body = vec![0u8; body_len];
        let n = store.read_value_at(self.value_idx, self.value_pos, &mut body)?;
        if n != body_len {
            return Err(Error::corrupted(format!(
                "value body at {}:{} is truncated ({} of {} bytes)",
                self.value_idx, self.value_pos, n, body_len,
            )));
        }
        let crc = u32::from_be_bytes(body[body_len - 4..].try_into().expect("4-byte tail"));
        if crc32c::crc32c(&body[..body_len - 4]) != crc {
            return Err(Error::corrupted(format!(
                "value body at {}:{} failed its checksum",
                self.value_idx, self.value_pos,
            )));
        }
        body.truncate(body_len - 4);
        self.value = body.split_off(self.preimage_len as usize);
        self.preimage = body;

        self.synced = true;
        Ok(())
    }

    /// Replace the value in place. The old version stays reachable through
    /// roots sealed before this write.
    pub fn overwrite(&mut self, preimage: Vec<u8>, value: Vec<u8>) {
        self.preimage_len = preimage.len() as u32;
        self.value_len = value.len() as u32;
        self.preimage = preimage;
        self.value = value;
        self.dirty = true;
        self.synced = true;
        self.hash = None;
    }

    pub fn hash(&mut self) -> NodeHash {
        if let Some(hash) = self.hash {
            return hash;
        }
        let hash = hasher::hash_leaf(&self.key, &hasher::hash_value(&self.value));
        self.hash = Some(hash);
        hash
    }

    pub fn allocate(&mut self, store: &FileStore) {
        if self.dirty {
            let (idx, pos) = store.reserve_tree_offset(LEAF_SIZE as u64);
            self.idx = idx;
            self.pos = pos;
        }
    }

    /// Write the value body, then the record pointing at it.
    pub fn commit(&mut self, store: &FileStore) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let body_len = self.preimage.len() + self.value.len() + 4;
        let mut body = Vec::with_capacity(body_len);
        body.extend_from_slice(&self.preimage);
        body.extend_from_slice(&self.value);
        let crc = crc32c::crc32c(&body);
        body.extend_from_slice(&crc.to_be_bytes());

        let (value_idx, value_pos) = store.reserve_value_offset(body_len as u64);
        let n = store.write_value(&body)?;
        if n != body_len {
            return Err(Error::PartialWrite {
                expected: body_len,
                written: n,
            });
        }
        self.value_idx = value_idx;
        self.value_pos = value_pos;

        let mut record = [0u8; LEAF_SIZE];
        self.marshal_to(&mut record);
        let n = store.write_tree(&record)?;
        if n != LEAF_SIZE {
            return Err(Error::PartialWrite {
                expected: LEAF_SIZE,
                written: n,
            });
        }

        self.dirty = false;
        Ok(())
    }

    pub fn marshal_to(&self, buf: &mut [u8; LEAF_SIZE]) {
        buf[0..32].copy_from_slice(&self.key);
        buf[32..36].copy_from_slice(&self.value_idx.to_be_bytes());
        buf[36..40].copy_from_slice(&self.value_pos.to_be_bytes());
        buf[40..44].copy_from_slice(&self.preimage_len.to_be_bytes());
        buf[44..48].copy_from_slice(&self.value_len.to_be_bytes());
        let crc = crc32c::crc32c(&buf[..48]);
        buf[48..52].copy_from_slice(&crc.to_be_bytes());
    }

    pub fn unmarshal(&mut self, buf: &[u8; LEAF_SIZE]) -> Result<()> {
        let crc = u32::from_be_bytes(buf[48..52].try_into().expect("4-byte field"));
        if crc32c::crc32c(&buf[..48]) != crc {
            return Err(Error::corrupted(format!(
                "leaf record at {}:{} failed its checksum",
                self.idx, self.pos,
            )));
        }
        self.key.copy_from_slice(&buf[0..32]);
        self.value_idx = u32::from_be_bytes(buf[32..36].try_into().expect("4-byte field"));
        self.value_pos = u32::from_be_bytes(buf[36..40].try_into().expect("4-byte field"));
        self.preimage_len = u32::from_be_bytes(buf[40..44].try_into().expect("4-byte field"));
        self.value_len = u32::from_be_bytes(buf[44..48].try_into().expect("4-byte field"));
        Ok(())
    }
}
