#![warn(missing_docs)]

//! A persistent, versioned, authenticated key-value store.
//!
//! Keys are addressed by the BLAKE2s-256 hash of their preimage inside a
//! 256-bit binary radix trie. Every commit seals a version whose root hash
//! binds the entire dataset; a holder of that root can verify membership or
//! non-membership of any key from a short self-checking witness, and every
//! sealed version stays readable and provable forever.
//!
//! Storage is append-only: fixed-width node records in `tree-N.udb` files,
//! value bodies in `value-N.udb` files, and a fixed-stride version log in
//! `version-0.udb`, all CRC-32C checked and rolled over at 2 GiB.
//!
//! ```no_run
//! use std::sync::Arc;
//! use urkel::proof::Proof;
//! use urkel::{Config, FileStore, Tree};
//!
//! # fn main() -> urkel::Result<()> {
//! let store = Arc::new(FileStore::open(Config::dev("/tmp/urkel-db"))?);
//! let mut tree = Tree::new(store);
//! tree.load_latest()?;
//!
//! tree.put(b"alice", b"100")?;
//! let version = tree.commit()?;
//!
//! let mut proof = Proof::new();
//! tree.generate_proof(b"alice", &mut proof)?;
//! assert!(proof.verify_membership(tree.hash(), b"alice"));
//! assert_eq!(tree.version(), version);
//! # Ok(())
//! # }
//! ```

pub use urkel_core::hasher;
pub use urkel_core::proof;
pub use urkel_core::{KeyPath, NodeHash, ValueHash};

pub use error::{Error, NotFound, Result};
pub use flush::FlushTree;
pub use iterator::TreeIterator;
pub use options::{Config, MAX_FILE_SIZE};
pub use safe::SafeTree;
pub use store::FileStore;
pub use tree::{Tree, MAX_VALUE_SIZE};

mod error;
mod flush;
mod iterator;
mod options;
mod safe;
mod store;
mod tree;
mod trie;
