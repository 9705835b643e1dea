//! The append-only paged file store.
//!
//! Three streams back the tree: `tree-N.udb` holds fixed-width node records,
//! `value-N.udb` holds value bodies, and `version-0.udb` is the fixed-stride
//! log of sealed roots. Tree and value streams are groups of files capped at
//! [`crate::options::MAX_FILE_SIZE`]; positions are `(file index, byte
//! offset)` pairs.
//!
//! The store's interior state sits behind mutexes so snapshots can share one
//! handle through an `Arc`; the embedder serialises writers externally.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::Config;

mod cache;
mod dir;
mod file;
mod group;

use dir::Dir;
use file::StoreFile;
use group::FilesGroup;

const TREE_PREFIX: &str = "tree";
const VALUE_PREFIX: &str = "value";
const VERSION_PREFIX: &str = "version";

/// Durable storage for tree pages, value bodies, and version records.
pub struct FileStore {
    dir: Arc<Dir>,
    trees: Mutex<FilesGroup>,
    values: Mutex<FilesGroup>,
    versions: Mutex<VersionLog>,
}

impl FileStore {
    /// Open the store described by `conf`, adopting any files already in
    /// the directory.
    pub fn open(conf: Config) -> Result<FileStore> {
        let dir = Dir::open(&conf.path)?;
        let mut trees = FilesGroup::new(
            TREE_PREFIX,
            dir.clone(),
            conf.max_file_size,
            conf.tree_write_buffer,
            conf.read_buffer_chunk_size,
        );
        // Value reads are large and single-shot, no point caching chunks.
        let mut values = FilesGroup::new(
            VALUE_PREFIX,
            dir.clone(),
            conf.max_file_size,
            conf.value_write_buffer,
            0,
        );
        let mut versions = VersionLog::new(dir.clone());

        trees.restore()?;
        values.restore()?;
        versions.restore()?;

        debug!(
            path = %conf.path.display(),
            tree_position = ?trees.position(),
            value_position = ?values.position(),
            version_bytes = versions.size,
            "opened file store",
        );

        Ok(FileStore {
            dir,
            trees: Mutex::new(trees),
            values: Mutex::new(values),
            versions: Mutex::new(versions),
        })
    }

    /// Claim the position the next `size`-byte tree record will land at.
    pub(crate) fn reserve_tree_offset(&self, size: u64) -> (u32, u32) {
        self.trees.lock().reserve(size)
    }

    /// Claim the position the next `size`-byte value body will land at.
    pub(crate) fn reserve_value_offset(&self, size: u64) -> (u32, u32) {
        self.values.lock().reserve(size)
    }

    /// Append a tree record; must follow the reservation order.
    pub(crate) fn write_tree(&self, buf: &[u8]) -> Result<usize> {
        self.trees.lock().write(buf)
    }

    /// Append a value body; must follow the reservation order.
    pub(crate) fn write_value(&self, buf: &[u8]) -> Result<usize> {
        self.values.lock().write(buf)
    }

    /// Read a tree record at `(index, pos)` through the chunk cache.
    pub(crate) fn read_tree_at(&self, index: u32, pos: u32, buf: &mut [u8]) -> Result<usize> {
        self.trees.lock().read_at(index, pos, buf)
    }

    /// Read a value body at `(index, pos)`.
    pub(crate) fn read_value_at(&self, index: u32, pos: u32, buf: &mut [u8]) -> Result<usize> {
        self.values.lock().read_at(index, pos, buf)
    }

    /// Append one version record.
    pub(crate) fn write_version(&self, buf: &[u8]) -> Result<usize> {
        self.versions.lock().write(buf)
    }

    /// Read the newest version record into `buf`. Returns `false` when the
    /// log is empty.
    pub(crate) fn read_last_version(&self, buf: &mut [u8]) -> Result<bool> {
        self.versions.lock().read_last(buf)
    }

    /// Read the record of `version`; records are `buf.len()` bytes wide.
    pub(crate) fn read_version(&self, version: u64, buf: &mut [u8]) -> Result<usize> {
        self.versions.lock().read(version, buf)
    }

    /// The number of whole `record_size`-byte records in the version log.
    pub(crate) fn version_count(&self, record_size: usize) -> u64 {
        self.versions.lock().size / record_size as u64
    }

    /// Push buffered writes out to the OS. No fsync.
    pub fn flush(&self) -> Result<()> {
        self.trees.lock().flush()?;
        self.values.lock().flush()?;
        Ok(())
    }

    /// Flush and fsync every stream, then fsync the directory.
    pub fn commit(&self) -> Result<()> {
        self.trees.lock().commit()?;
        self.values.lock().commit()?;
        self.versions.lock().commit()?;
        self.dir.commit()?;
        Ok(())
    }

    /// Flush buffers and drop every open handle. Idempotent.
    pub fn close(&self) -> Result<()> {
        self.trees.lock().close()?;
        self.values.lock().close()?;
        self.versions.lock().close()?;
        Ok(())
    }
}

/// The single-file, fixed-stride log of sealed versions.
struct VersionLog {
    dir: Arc<Dir>,
    file: Option<StoreFile>,
    size: u64,
}

impl VersionLog {
    fn new(dir: Arc<Dir>) -> Self {
        VersionLog {
            dir,
            file: None,
            size: 0,
        }
    }

    fn file(&mut self) -> Result<&mut StoreFile> {
        if self.file.is_none() {
            self.file = Some(self.dir.open_file(VERSION_PREFIX, 0)?);
        }
        Ok(self.file.as_mut().expect("version file was just opened"))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let file = self.file()?;
        let name = file.name().to_owned();
        let n = file
            .append(buf)
            .map_err(|e| Error::io(format!("append to {}", name), e))?;
        self.size += n as u64;
        Ok(n)
    }

    fn read_last(&mut self, buf: &mut [u8]) -> Result<bool> {
        let record = buf.len() as u64;
        if self.size < record {
            return Ok(false);
        }
        let off = self.size - record;
        let n = self.read_at(buf, off)?;
        if n != buf.len() {
            return Err(Error::corrupted(format!(
                "version record at offset {} is truncated",
                off
            )));
        }
        Ok(true)
    }

    fn read(&mut self, version: u64, buf: &mut [u8]) -> Result<usize> {
        let off = (version - 1) * buf.len() as u64;
        self.read_at(buf, off)
    }

    fn read_at(&mut self, buf: &mut [u8], off: u64) -> Result<usize> {
        let file = self.file()?;
        let name = file.name().to_owned();
        file.read_at(buf, off)
            .map_err(|e| Error::io(format!("read {} @ {}", name, off), e))
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync()
                .map_err(|e| Error::io(format!("fsync {}", file.name()), e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        let file = self.file()?;
        let name = file.name().to_owned();
        self.size = file
            .size()
            .map_err(|e| Error::io(format!("stat {}", name), e))?;
        Ok(())
    }
}
