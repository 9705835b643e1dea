//! Chunked read cache in front of a tree file.
//!
//! Node records are tiny (52 and 86 bytes) and descents revisit the same
//! neighbourhoods, so each reader keeps a handful of recently fetched chunks
//! and serves any read fully contained in one of them. Value reads bypass
//! this layer; they are large and single-shot.

use std::io;

use super::file::StoreFile;

/// Chunks retained per file.
const MAX_CHUNKS: usize = 10;

struct Chunk {
    off: u64,
    limit: u64,
    buf: Vec<u8>,
}

impl Chunk {
    fn contains(&self, off: u64, len: u64) -> bool {
        off >= self.off && off + len <= self.limit
    }
}

struct OffsetCache {
    chunk_size: usize,
    hit: u64,
    miss: u64,
    chunks: Vec<Chunk>,
}

impl OffsetCache {
    fn new(chunk_size: usize) -> Self {
        OffsetCache {
            chunk_size,
            hit: 0,
            miss: 0,
            chunks: Vec::with_capacity(MAX_CHUNKS),
        }
    }

    /// Serve the read from a chunk fully containing it, if any.
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> Option<usize> {
        for chunk in &self.chunks {
            if chunk.contains(off, buf.len() as u64) {
                self.hit += 1;
                let start = (off - chunk.off) as usize;
                buf.copy_from_slice(&chunk.buf[start..start + buf.len()]);
                return Some(buf.len());
            }
        }
        if !self.chunks.is_empty() {
            self.miss += 1;
        }
        None
    }

    /// A zeroed chunk buffer, recycled from the slot about to be evicted
    /// once the cache is full.
    fn take_buf(&mut self) -> Vec<u8> {
        if self.chunks.len() == MAX_CHUNKS {
            // Evict the coldest slot and reuse its allocation.
            let mut buf = self.chunks.pop().expect("cache is full").buf;
            buf.iter_mut().for_each(|b| *b = 0);
            buf
        } else {
            vec![0u8; self.chunk_size]
        }
    }

    fn insert(&mut self, buf: Vec<u8>, off: u64, filled: usize) {
        debug_assert!(self.chunks.len() < MAX_CHUNKS);
        self.chunks.insert(
            0,
            Chunk {
                off,
                limit: off + filled as u64,
                buf,
            },
        );
    }
}

/// A positional reader over one file, going through the chunk cache.
pub(crate) struct CachingFile {
    file: StoreFile,
    cache: OffsetCache,
}

impl CachingFile {
    pub fn new(file: StoreFile, chunk_size: usize) -> Self {
        CachingFile {
            file,
            cache: OffsetCache::new(chunk_size),
        }
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn read_at(&mut self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        if let Some(n) = self.cache.read_at(buf, off) {
            return Ok(n);
        }
        let mut chunk = self.cache.take_buf();
        let filled = self.file.read_at(&mut chunk, off)?;
        let copied = buf.len().min(filled);
        buf[..copied].copy_from_slice(&chunk[..copied]);
        self.cache.insert(chunk, off, filled);
        Ok(copied)
    }
}
