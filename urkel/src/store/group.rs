//! An append-only group of fixed-max-size files sharing one prefix.
//!
//! The group keeps two cursors over the same address space. The *reserved*
//! cursor hands out `(index, position)` pairs before anything is written, so
//! a parent node can record where its children will land. The *durable*
//! cursor advances as bytes are handed to the buffered writer. Writes must
//! arrive in reservation order; both cursors roll to the next file at the
//! same threshold, which keeps predicted and actual positions identical.

use std::{
    collections::HashMap,
    io::{BufWriter, Write},
    sync::Arc,
};

use super::{cache::CachingFile, dir::Dir, file::StoreFile};
use crate::error::{Error, Result};

/// A cursor over the group's address space, rolling files at the size cap.
pub(crate) struct Offset {
    index: u32,
    offset: u64,
    max_file_size: u64,
}

impl Offset {
    pub fn new(index: u32, offset: u64, max_file_size: u64) -> Self {
        Offset {
            index,
            offset,
            max_file_size,
        }
    }

    /// Claim `size` bytes, returning where they start. Rolls to the next
    /// file when the current one cannot take the whole record.
    pub fn offset_for(&mut self, size: u64) -> (u32, u32) {
        if self.offset + size > self.max_file_size {
            self.index += 1;
            self.offset = 0;
        }
        let start = self.offset;
        self.offset += size;
        (self.index, start as u32)
    }

    pub fn position(&self) -> (u32, u64) {
        (self.index, self.offset)
    }
}

enum Reader {
    Plain(StoreFile),
    Caching(CachingFile),
}

impl Reader {
    fn read_at(&mut self, buf: &mut [u8], off: u64) -> std::io::Result<usize> {
        match self {
            Reader::Plain(file) => file.read_at(buf, off),
            Reader::Caching(file) => file.read_at(buf, off),
        }
    }

    fn name(&self) -> &str {
        match self {
            Reader::Plain(file) => file.name(),
            Reader::Caching(file) => file.name(),
        }
    }
}

pub(crate) struct FilesGroup {
    prefix: &'static str,
    dir: Arc<Dir>,
    max_file_size: u32,
    buf_size: usize,
    /// Chunk size of the read cache; 0 leaves readers uncached.
    chunk_size: usize,

    reserved: Offset,
    durable: Offset,

    /// Pooled handles, one per file index, closed only with the store.
    opened: HashMap<u32, StoreFile>,
    readers: HashMap<u32, Reader>,

    windex: u32,
    writer: Option<BufWriter<StoreFile>>,
    /// Writers displaced by a file roll; they still hold buffered bytes
    /// until the next flush or commit.
    dirty: Vec<BufWriter<StoreFile>>,
}

impl FilesGroup {
    pub fn new(
        prefix: &'static str,
        dir: Arc<Dir>,
        max_file_size: u32,
        buf_size: usize,
        chunk_size: usize,
    ) -> Self {
        FilesGroup {
            prefix,
            dir,
            max_file_size,
            buf_size,
            chunk_size,
            reserved: Offset::new(0, 0, max_file_size as u64),
            durable: Offset::new(0, 0, max_file_size as u64),
            opened: HashMap::new(),
            readers: HashMap::new(),
            windex: 0,
            writer: None,
            dirty: Vec::new(),
        }
    }

    fn get(&mut self, index: u32) -> Result<&StoreFile> {
        if !self.opened.contains_key(&index) {
            let file = self.dir.open_file(self.prefix, index)?;
            self.opened.insert(index, file);
        }
        Ok(&self.opened[&index])
    }

    /// Claim `size` bytes of the group's address space without writing.
    pub fn reserve(&mut self, size: u64) -> (u32, u32) {
        self.reserved.offset_for(size)
    }

    /// Append a record. The caller must append records in the exact order
    /// their positions were reserved.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let (index, _) = self.durable.offset_for(buf.len() as u64);
        let writer = self.writer_for(index)?;
        let name = writer.get_ref().name().to_owned();
        writer
            .write(buf)
            .map_err(|e| Error::io(format!("append to {}", name), e))
    }

    fn writer_for(&mut self, index: u32) -> Result<&mut BufWriter<StoreFile>> {
        if self.writer.is_none() || self.windex != index {
            let file = self.get(index)?;
            let clone = file
                .try_clone()
                .map_err(|e| Error::io(format!("clone handle {}", file.name()), e))?;
            let fresh = BufWriter::with_capacity(self.buf_size, clone);
            if let Some(old) = self.writer.replace(fresh) {
                self.dirty.push(old);
            }
            self.windex = index;
        }
        Ok(self.writer.as_mut().expect("writer was just installed"))
    }

    /// Positional read at `(index, pos)`.
    pub fn read_at(&mut self, index: u32, pos: u32, buf: &mut [u8]) -> Result<usize> {
        if !self.readers.contains_key(&index) {
            let file = self.get(index)?;
            let clone = file
                .try_clone()
                .map_err(|e| Error::io(format!("clone handle {}", file.name()), e))?;
            let reader = if self.chunk_size > 0 {
                Reader::Caching(CachingFile::new(clone, self.chunk_size))
            } else {
                Reader::Plain(clone)
            };
            self.readers.insert(index, reader);
        }
        let reader = self.readers.get_mut(&index).expect("reader was just installed");
        let name = reader.name().to_owned();
        reader
            .read_at(buf, pos as u64)
            .map_err(|e| Error::io(format!("read {} @ {}", name, pos), e))
    }

    /// Drain buffered writers out to the OS. No fsync.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            flush_writer(writer)?;
        }
        for writer in &mut self.dirty {
            flush_writer(writer)?;
        }
        Ok(())
    }

    /// Flush and fsync every writer touched since the last commit, then
    /// forget the displaced ones.
    pub fn commit(&mut self) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            flush_writer(writer)?;
            sync_writer(writer)?;
        }
        for writer in &mut self.dirty {
            flush_writer(writer)?;
            sync_writer(writer)?;
        }
        self.dirty.clear();
        Ok(())
    }

    /// Flush buffers and drop every handle.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;
        self.dirty.clear();
        self.readers.clear();
        self.opened.clear();
        Ok(())
    }

    /// Adopt on-disk state: both cursors point at the end of the file with
    /// the highest index.
    pub fn restore(&mut self) -> Result<()> {
        let last = self.dir.last_index(self.prefix)?;
        let file = self.get(last)?;
        let size = file
            .size()
            .map_err(|e| Error::io(format!("stat {}", file.name()), e))?;
        self.reserved = Offset::new(last, size, self.max_file_size as u64);
        self.durable = Offset::new(last, size, self.max_file_size as u64);
        Ok(())
    }

    pub fn position(&self) -> (u32, u64) {
        self.durable.position()
    }
}

fn flush_writer(writer: &mut BufWriter<StoreFile>) -> Result<()> {
    let name = writer.get_ref().name().to_owned();
    writer
        .flush()
        .map_err(|e| Error::io(format!("flush {}", name), e))
}

fn sync_writer(writer: &mut BufWriter<StoreFile>) -> Result<()> {
    let file = writer.get_ref();
    file.sync()
        .map_err(|e| Error::io(format!("fsync {}", file.name()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn group(max_file_size: u32) -> FilesGroup {
        let dir = Dir::open(Path::new("")).unwrap();
        FilesGroup::new("tree", dir, max_file_size, 64, 0)
    }

    #[test]
    fn offset_rolls_at_the_file_cap() {
        let mut offset = Offset::new(0, 0, 100);
        assert_eq!(offset.offset_for(60), (0, 0));
        assert_eq!(offset.offset_for(60), (1, 0));
        assert_eq!(offset.offset_for(30), (1, 60));
        assert_eq!(offset.offset_for(10), (1, 90));
        assert_eq!(offset.offset_for(11), (2, 0));
    }

    #[test]
    fn reserved_positions_match_written_positions() {
        let mut group = group(100);
        let records: Vec<Vec<u8>> = (0u8..8).map(|i| vec![i; 40]).collect();

        let reserved: Vec<(u32, u32)> = records
            .iter()
            .map(|r| group.reserve(r.len() as u64))
            .collect();
        for record in &records {
            assert_eq!(group.write(record).unwrap(), record.len());
        }
        group.flush().unwrap();

        for (record, (index, pos)) in records.iter().zip(reserved) {
            let mut buf = vec![0u8; record.len()];
            assert_eq!(group.read_at(index, pos, &mut buf).unwrap(), record.len());
            assert_eq!(&buf, record);
        }
    }

    #[test]
    fn restore_adopts_the_last_file() {
        let dir = Dir::open(Path::new("")).unwrap();
        {
            let mut group = FilesGroup::new("tree", dir.clone(), 100, 64, 0);
            for i in 0u8..5 {
                group.reserve(40);
                group.write(&[i; 40]).unwrap();
            }
            group.commit().unwrap();
        }

        let mut group = FilesGroup::new("tree", dir, 100, 64, 0);
        group.restore().unwrap();
        // Five 40-byte records across 100-byte files: two per file, the
        // fifth alone in file 2.
        assert_eq!(group.position(), (2, 40));
        assert_eq!(group.reserve(40), (2, 40));
    }
}
