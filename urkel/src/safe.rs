//! The mutex-guarded wrapper serialising one writer against many readers.

use parking_lot::Mutex;
use urkel_core::{proof::Proof, NodeHash};

use crate::error::Result;
use crate::tree::Tree;

/// A [`Tree`] behind a mutex, exposing a `&self` API.
///
/// Every operation takes the lock for its duration. Snapshots are handed
/// out as independent [`Tree`] values and read outside the lock.
pub struct SafeTree {
    tree: Mutex<Tree>,
}

impl SafeTree {
    /// Wrap `tree`.
    pub fn new(tree: Tree) -> Self {
        SafeTree {
            tree: Mutex::new(tree),
        }
    }

    /// See [`Tree::put`].
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree.lock().put(key, value)
    }

    /// See [`Tree::get`].
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.tree.lock().get(key)
    }

    /// See [`Tree::delete`].
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.tree.lock().delete(key)
    }

    /// See [`Tree::hash`].
    pub fn hash(&self) -> NodeHash {
        self.tree.lock().hash()
    }

    /// See [`Tree::commit`].
    pub fn commit(&self) -> Result<u64> {
        self.tree.lock().commit()
    }

    /// See [`Tree::flush`].
    pub fn flush(&self) -> Result<()> {
        self.tree.lock().flush()
    }

    /// See [`Tree::version`].
    pub fn version(&self) -> u64 {
        self.tree.lock().version()
    }

    /// See [`Tree::load_latest`].
    pub fn load_latest(&self) -> Result<()> {
        self.tree.lock().load_latest()
    }

    /// See [`Tree::load_version`].
    pub fn load_version(&self, version: u64) -> Result<()> {
        self.tree.lock().load_version(version)
    }

    /// See [`Tree::generate_proof`].
    pub fn generate_proof(&self, key: &[u8], proof: &mut Proof) -> Result<()> {
        self.tree.lock().generate_proof(key, proof)
    }

    /// See [`Tree::snapshot`].
    pub fn snapshot(&self) -> Tree {
        self.tree.lock().snapshot()
    }

    /// See [`Tree::version_snapshot`].
    pub fn version_snapshot(&self, version: u64) -> Result<Tree> {
        self.tree.lock().version_snapshot(version)
    }

    /// Unwrap the tree.
    pub fn into_inner(self) -> Tree {
        self.tree.into_inner()
    }
}
