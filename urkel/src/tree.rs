//! The versioned tree over the file store.
//!
//! A [`Tree`] holds at most one dirty working root. Committing allocates
//! positions for the dirty frontier, serialises it, seals a version record,
//! fsyncs, and then swaps the live root for a clean copy that carries only
//! `(index, position, hash)`. Every sealed version stays addressable:
//! [`Tree::load_version`] and [`Tree::version_snapshot`] reopen any of them.

use std::sync::Arc;

use tracing::debug;
use urkel_core::{hasher, proof::Proof, NodeHash};

use crate::error::{Error, NotFound, Result};
use crate::store::FileStore;
use crate::trie::Inner;

/// Size of a version record: `version ‖ root_idx ‖ root_pos ‖ root_hash ‖
/// crc32c ‖ reserved`, big-endian, 56 bytes.
pub(crate) const VERSION_SIZE: usize = 56;

/// Largest value body accepted by [`Tree::put`].
pub const MAX_VALUE_SIZE: usize = u32::MAX as usize;

/// A persistent, versioned, authenticated key-value map.
///
/// Not internally synchronised: one writer at a time, and each snapshot is
/// a single-reader value. Wrap it in [`crate::SafeTree`] to share.
pub struct Tree {
    store: Arc<FileStore>,
    root: Option<Inner>,
    version: u64,
}

impl Tree {
    /// A tree over `store` with no root loaded. Call [`Tree::load_latest`]
    /// to adopt the newest committed version, if any.
    pub fn new(store: Arc<FileStore>) -> Self {
        Tree {
            store,
            root: None,
            version: 0,
        }
    }

    /// The store this tree reads and writes.
    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    /// The version of the last commit this tree observed; 0 before any.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The root hash binding the current contents. The empty tree hashes to
    /// the zeros sentinel.
    pub fn hash(&mut self) -> NodeHash {
        match &mut self.root {
            None => hasher::zeros_hash(),
            Some(root) => root.hash(),
        }
    }

    /// Insert or overwrite `key`. Values live with the tree in memory until
    /// the next flush or commit.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::InvalidInput(format!(
                "value of {} bytes exceeds the {} byte cap",
                value.len(),
                MAX_VALUE_SIZE,
            )));
        }
        if key.len() > MAX_VALUE_SIZE {
            return Err(Error::InvalidInput(format!(
                "key of {} bytes exceeds the {} byte cap",
                key.len(),
                MAX_VALUE_SIZE,
            )));
        }
        let hashed = hasher::hash_key(key);
        let root = self.root.get_or_insert_with(|| Inner::new(0));
        root.put(&self.store, hashed, key.to_vec(), value.to_vec())
    }

    /// Fetch the value of `key`, or [`Error::NotFound`] with a dead-end or
    /// collision diagnostic.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let hashed = hasher::hash_key(key);
        match &mut self.root {
            None => Err(Error::NotFound(NotFound::DeadEnd { bit: 0 })),
            Some(root) => root.get(&self.store, &hashed),
        }
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let hashed = hasher::hash_key(key);
        if let Some(root) = &mut self.root {
            // The root stays in place even when it empties.
            root.delete(&self.store, &hashed)?;
        }
        Ok(())
    }

    /// Seal the current contents as the next version: write the dirty
    /// frontier, append a version record, and fsync. On success the live
    /// root becomes a clean copy and dirty subtrees are dropped.
    ///
    /// Committing an empty tree is a no-op; committing an unchanged one
    /// still seals a new version over the same root.
    pub fn commit(&mut self) -> Result<u64> {
        let root = match &mut self.root {
            None => return Ok(self.version),
            Some(root) => root,
        };

        root.allocate(&self.store);
        root.commit(&self.store)?;

        let version = self.version + 1;
        let (idx, pos) = root.position();
        let hash = root.hash();

        let mut record = [0u8; VERSION_SIZE];
        marshal_version(version, idx, pos, &hash, &mut record);
        let n = self.store.write_version(&record)?;
        if n != VERSION_SIZE {
            return Err(Error::PartialWrite {
                expected: VERSION_SIZE,
                written: n,
            });
        }
        self.store.commit()?;

        debug!(version, root_idx = idx, root_pos = pos, "sealed version");
        self.version = version;
        self.root = Some(Inner::from_position(0, idx, pos, hash));
        Ok(version)
    }

    /// Write the dirty frontier out without sealing a version or fsyncing.
    /// Frees the memory held by dirty subtrees' ancestors on the next
    /// iteration and keeps commit latency flat over large batches.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(root) = &mut self.root {
            root.allocate(&self.store);
            root.commit(&self.store)?;
            self.store.flush()?;
        }
        Ok(())
    }

    /// Adopt the newest committed version, or the empty tree if none exist.
    pub fn load_latest(&mut self) -> Result<()> {
        let mut record = [0u8; VERSION_SIZE];
        if !self.store.read_last_version(&mut record)? {
            self.root = None;
            self.version = 0;
            return Ok(());
        }
        let (version, root) = unmarshal_version(&record)?;
        debug!(version, "loaded latest version");
        self.version = version;
        self.root = Some(root);
        Ok(())
    }

    /// Adopt a specific committed version. The tree is unchanged on error.
    pub fn load_version(&mut self, version: u64) -> Result<()> {
        let (loaded, root) = self.read_version_record(version)?;
        debug!(version = loaded, "loaded version");
        self.version = loaded;
        self.root = Some(root);
        Ok(())
    }

    /// An independent reader over the current root. Reflects durable state:
    /// take it after a commit or flush.
    pub fn snapshot(&mut self) -> Tree {
        let root = match &mut self.root {
            None => None,
            Some(root) => {
                let (idx, pos) = root.position();
                let hash = root.hash();
                Some(Inner::from_position(0, idx, pos, hash))
            }
        };
        Tree {
            store: self.store.clone(),
            root,
            version: self.version,
        }
    }

    /// An independent reader over the root sealed as `version`.
    pub fn version_snapshot(&self, version: u64) -> Result<Tree> {
        let (loaded, root) = self.read_version_record(version)?;
        Ok(Tree {
            store: self.store.clone(),
            root: Some(root),
            version: loaded,
        })
    }

    fn read_version_record(&self, version: u64) -> Result<(u64, Inner)> {
        if version == 0 {
            return Err(Error::InvalidInput(
                "version 0 is the empty tree and has no record".into(),
            ));
        }
        let latest = self.store.version_count(VERSION_SIZE);
        if version > latest {
            return Err(Error::VersionTooHigh {
                requested: version,
                latest,
            });
        }
        let mut record = [0u8; VERSION_SIZE];
        let n = self.store.read_version(version, &mut record)?;
        if n != VERSION_SIZE {
            return Err(Error::corrupted(format!(
                "version record {} is truncated ({} of {} bytes)",
                version, n, VERSION_SIZE,
            )));
        }
        unmarshal_version(&record)
    }

    /// Fill `proof` with the witness for `key` against the current root.
    /// The accumulator is reset first, so one proof can be reused.
    pub fn generate_proof(&mut self, key: &[u8], proof: &mut Proof) -> Result<()> {
        proof.reset();
        let hashed = hasher::hash_key(key);
        match &mut self.root {
            None => {
                proof.set_dead_end();
                Ok(())
            }
            Some(root) => root.prove(&self.store, &hashed, proof),
        }
    }

    /// Visit every live `(preimage, value)` pair in hashed-key bit order.
    /// The callback returns `true` to stop the walk.
    pub fn iterate<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        if let Some(root) = &mut self.root {
            root.iterate(&self.store, false, &mut f)?;
        }
        Ok(())
    }

    /// [`Tree::iterate`] in the opposite order.
    pub fn reverse_iterate<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        if let Some(root) = &mut self.root {
            root.iterate(&self.store, true, &mut f)?;
        }
        Ok(())
    }
}

fn marshal_version(
    version: u64,
    root_idx: u32,
    root_pos: u32,
    root_hash: &NodeHash,
    buf: &mut [u8; VERSION_SIZE],
) {
    buf[0..8].copy_from_slice(&version.to_be_bytes());
    buf[8..12].copy_from_slice(&root_idx.to_be_bytes());
    buf[12..16].copy_from_slice(&root_pos.to_be_bytes());
    buf[16..48].copy_from_slice(root_hash);
    let crc = crc32c::crc32c(&buf[..48]);
    buf[48..52].copy_from_slice(&crc.to_be_bytes());
    // Bytes 52..56 are reserved and keep the stride at 56.
}

fn unmarshal_version(buf: &[u8; VERSION_SIZE]) -> Result<(u64, Inner)> {
    let crc = u32::from_be_bytes(buf[48..52].try_into().expect("4-byte field"));
    if crc32c::crc32c(&buf[..48]) != crc {
        return Err(Error::corrupted("version record failed its checksum"));
    }
    let version = u64::from_be_bytes(buf[0..8].try_into().expect("8-byte field"));
    let root_idx = u32::from_be_bytes(buf[8..12].try_into().expect("4-byte field"));
    let root_pos = u32::from_be_bytes(buf[12..16].try_into().expect("4-byte field"));
    let root_hash: NodeHash = buf[16..48].try_into().expect("32-byte field");
    Ok((version, Inner::from_position(0, root_idx, root_pos, root_hash)))
}
