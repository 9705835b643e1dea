//! Error kinds surfaced by the store and the trie.
//!
//! Every failure is a value of [`Error`]; callers branch on the kind rather
//! than on message text. An error leaves the tree's in-memory state as it
//! was, and the caller decides whether to retry, abort, or reload from disk.

use std::{fmt, io};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Diagnostic detail of a failed lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    /// Descent reached an empty child slot at the given depth bit.
    DeadEnd {
        /// Depth bit of the inner node holding the empty slot.
        bit: u16,
    },
    /// Descent reached a leaf owned by a different key at the given depth bit.
    Collision {
        /// Depth bit of the inner node holding the colliding leaf.
        bit: u16,
    },
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::DeadEnd { bit } => write!(f, "dead end at bit {}", bit),
            NotFound::Collision { bit } => write!(f, "leaf collision at bit {}", bit),
        }
    }
}

/// All failures surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The key has no value in the tree.
    #[error("key not found: {0}")]
    NotFound(NotFound),
    /// A persisted record failed its checksum or was truncated.
    #[error("corrupted entry: {context}")]
    Corrupted {
        /// Where and what failed to decode.
        context: String,
    },
    /// A write consumed fewer bytes than the record requires.
    #[error("partial write: {written} of {expected} bytes")]
    PartialWrite {
        /// Bytes the record requires.
        expected: usize,
        /// Bytes the store accepted.
        written: usize,
    },
    /// An I/O failure in the underlying file layer.
    #[error("{context}: {source}")]
    Io {
        /// The file and offset the operation touched.
        context: String,
        /// The originating I/O error.
        #[source]
        source: io::Error,
    },
    /// The requested version has not been committed yet.
    #[error("version {requested} is beyond the latest committed version {latest}")]
    VersionTooHigh {
        /// The version asked for.
        requested: u64,
        /// The newest version in the log.
        latest: u64,
    },
    /// The operation's input is outside the supported range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for both the dead-end and collision flavours of a missed lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True when a persisted record failed its CRC or came back short.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Error::Corrupted { .. })
    }

    pub(crate) fn corrupted(context: impl Into<String>) -> Error {
        Error::Corrupted {
            context: context.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Error {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}
