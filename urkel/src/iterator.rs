//! A pull-style cursor over the trie's callback walk.
//!
//! [`Tree::iterate`] pushes entries at a callback; turning that inside out
//! needs a second thread. The worker drives the walk and parks on a
//! zero-capacity channel, so exactly one entry is in flight: each `send`
//! rendezvouses with the consumer's [`TreeIterator::next`]. Dropping the
//! receiving side makes the next `send` fail, which the walk reads as its
//! stop signal.

use crossbeam_channel::{bounded, Receiver};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::tree::Tree;

type Entry = (Vec<u8>, Vec<u8>);

/// A cursor yielding `(key preimage, value)` pairs in hashed-key bit order.
///
/// `key` and `value` are valid while [`TreeIterator::valid`] holds;
/// [`TreeIterator::next`] on an invalid iterator is a programming error and
/// panics.
pub struct TreeIterator {
    rx: Option<Receiver<Entry>>,
    handle: Option<JoinHandle<Result<()>>>,
    current: Option<Entry>,
    err: Option<Error>,
    done: bool,
}

impl TreeIterator {
    /// Walk `tree` in natural (left-to-right) bit order.
    pub fn new(tree: Tree) -> Self {
        Self::spawn(tree, false)
    }

    /// Walk `tree` in reverse bit order.
    pub fn new_reverse(tree: Tree) -> Self {
        Self::spawn(tree, true)
    }

    fn spawn(mut tree: Tree, reverse: bool) -> Self {
        let (tx, rx) = bounded::<Entry>(0);
        let handle = thread::spawn(move || {
            if reverse {
                tree.reverse_iterate(|key, value| tx.send((key.to_vec(), value.to_vec())).is_err())
            } else {
                tree.iterate(|key, value| tx.send((key.to_vec(), value.to_vec())).is_err())
            }
        });
        let mut iter = TreeIterator {
            rx: Some(rx),
            handle: Some(handle),
            current: None,
            err: None,
            done: false,
        };
        iter.advance();
        iter
    }

    fn advance(&mut self) {
        let recv = match &self.rx {
            Some(rx) => rx.recv(),
            None => {
                self.done = true;
                return;
            }
        };
        match recv {
            Ok(entry) => self.current = Some(entry),
            Err(_) => {
                // The walk finished and dropped its sender; collect its
                // outcome.
                self.current = None;
                self.done = true;
                self.rx = None;
                if let Some(handle) = self.handle.take() {
                    match handle.join() {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => self.err = Some(err),
                        Err(panic) => std::panic::resume_unwind(panic),
                    }
                }
            }
        }
    }

    /// Whether the cursor points at an entry.
    pub fn valid(&self) -> bool {
        self.err.is_none() && !self.done && self.current.is_some()
    }

    /// Move to the next entry.
    ///
    /// # Panics
    ///
    /// When the cursor is not [`TreeIterator::valid`].
    pub fn next(&mut self) {
        assert!(self.valid(), "iterator is not valid");
        self.advance();
    }

    /// The current entry's key preimage.
    pub fn key(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is not valid").0
    }

    /// The current entry's value.
    pub fn value(&self) -> &[u8] {
        &self.current.as_ref().expect("iterator is not valid").1
    }

    /// Stop the walk and release the worker. Idempotent; the cursor is
    /// invalid afterwards.
    pub fn close(&mut self) {
        self.current = None;
        self.done = true;
        // Dropping the receiver fails the worker's pending send.
        self.rx = None;
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(_) => {}
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
    }

    /// The error that ended the walk, if any.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }
}

impl Drop for TreeIterator {
    fn drop(&mut self) {
        self.close();
    }
}
