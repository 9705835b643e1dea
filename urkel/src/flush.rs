//! Periodic-flush adapter over a [`Tree`].
//!
//! Long ingestion runs hold every dirty node in memory until the next
//! commit. Wrapping the tree in a [`FlushTree`] writes the dirty frontier
//! out every `n` puts, trading a little write amplification for a flat
//! memory profile. Commits are still explicit.

use crate::error::Result;
use crate::tree::Tree;

/// A [`Tree`] that flushes itself every `n` puts.
pub struct FlushTree {
    tree: Tree,
    every: usize,
    puts: usize,
}

impl FlushTree {
    /// Wrap `tree`, flushing after every `every` puts.
    pub fn new(tree: Tree, every: usize) -> Self {
        assert!(every > 0, "flush period must be positive");
        FlushTree {
            tree,
            every,
            puts: 0,
        }
    }

    /// Insert or overwrite `key`, flushing if the period rolled over.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree.put(key, value)?;
        self.puts += 1;
        if self.puts % self.every == 0 {
            self.tree.flush()?;
        }
        Ok(())
    }

    /// Fetch the value of `key`.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.tree.get(key)
    }

    /// Force a flush regardless of the period.
    pub fn flush(&mut self) -> Result<()> {
        self.tree.flush()
    }

    /// Seal a version; see [`Tree::commit`].
    pub fn commit(&mut self) -> Result<u64> {
        self.puts = 0;
        self.tree.commit()
    }

    /// The wrapped tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The wrapped tree, mutably, for operations the adapter does not
    /// forward.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Unwrap the tree.
    pub fn into_inner(self) -> Tree {
        self.tree
    }
}
