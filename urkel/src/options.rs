use std::path::PathBuf;

/// Soft cap on the size of an individual store file, 2 GiB. Offsets within a
/// file fit a `u32`; file indexes extend the address space indefinitely.
pub const MAX_FILE_SIZE: u32 = 2 << 30;

/// Options for opening a [`crate::FileStore`].
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) path: PathBuf,
    pub(crate) max_file_size: u32,
    pub(crate) tree_write_buffer: usize,
    pub(crate) value_write_buffer: usize,
    pub(crate) read_buffer_chunk_size: usize,
}

impl Config {
    /// Development defaults: tiny write buffers so tests exercise flushing.
    ///
    /// An empty `path` selects the in-memory backend.
    pub fn dev(path: impl Into<PathBuf>) -> Self {
        Config {
            path: path.into(),
            max_file_size: MAX_FILE_SIZE,
            tree_write_buffer: 1 << 10,
            value_write_buffer: 1 << 10,
            read_buffer_chunk_size: 1024,
        }
    }

    /// Production defaults: large write buffers to amortise commit syscalls.
    pub fn prod(path: impl Into<PathBuf>) -> Self {
        Config {
            path: path.into(),
            max_file_size: MAX_FILE_SIZE,
            tree_write_buffer: 16 << 20,
            value_write_buffer: 8 << 20,
            read_buffer_chunk_size: 1024,
        }
    }

    /// An in-memory store, for tests.
    pub fn in_memory() -> Self {
        Config::dev("")
    }

    /// Set the per-file rollover threshold.
    pub fn max_file_size(&mut self, max_file_size: u32) {
        self.max_file_size = max_file_size;
    }

    /// Set the buffered-writer size for the tree stream.
    pub fn tree_write_buffer(&mut self, bytes: usize) {
        self.tree_write_buffer = bytes;
    }

    /// Set the buffered-writer size for the value stream.
    pub fn value_write_buffer(&mut self, bytes: usize) {
        self.value_write_buffer = bytes;
    }

    /// Set the chunk size of the tree read cache. Zero disables caching.
    pub fn read_buffer_chunk_size(&mut self, bytes: usize) {
        self.read_buffer_chunk_size = bytes;
    }
}
