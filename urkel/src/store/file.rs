//! A pooled handle to one store file: append writes, positional reads.
//!
//! Files opened through a [`super::dir::Dir`] with an empty path live in
//! memory; everything above this module is oblivious to the difference.

use std::{fs::File, io, os::unix::fs::FileExt, sync::Arc};

use parking_lot::Mutex;

/// Contents of an in-memory file, shared by every clone of its handle.
pub(crate) type MemFile = Arc<Mutex<Vec<u8>>>;

enum Backing {
    Disk(File),
    Mem(MemFile),
}

pub(crate) struct StoreFile {
    name: String,
    backing: Backing,
}

impl StoreFile {
    pub fn disk(name: String, file: File) -> Self {
        StoreFile {
            name,
            backing: Backing::Disk(file),
        }
    }

    pub fn mem(name: String, contents: MemFile) -> Self {
        StoreFile {
            name,
            backing: Backing::Mem(contents),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A second handle over the same file. Disk handles share the open file
    /// description, so the append cursor stays coherent across clones.
    pub fn try_clone(&self) -> io::Result<StoreFile> {
        let backing = match &self.backing {
            Backing::Disk(file) => Backing::Disk(file.try_clone()?),
            Backing::Mem(contents) => Backing::Mem(contents.clone()),
        };
        Ok(StoreFile {
            name: self.name.clone(),
            backing,
        })
    }

    pub fn size(&self) -> io::Result<u64> {
        match &self.backing {
            Backing::Disk(file) => Ok(file.metadata()?.len()),
            Backing::Mem(contents) => Ok(contents.lock().len() as u64),
        }
    }

    /// Append `buf` at the end of the file.
    pub fn append(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.backing {
            Backing::Disk(file) => {
                use io::Write as _;
                file.write_all(buf)?;
            }
            Backing::Mem(contents) => contents.lock().extend_from_slice(buf),
        }
        Ok(buf.len())
    }

    /// Read at an absolute offset. Returns how many bytes were available,
    /// which is short of `buf.len()` only at the end of the file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match &self.backing {
            Backing::Disk(file) => {
                let mut read = 0;
                while read < buf.len() {
                    let n = file.read_at(&mut buf[read..], offset + read as u64)?;
                    if n == 0 {
                        break;
                    }
                    read += n;
                }
                Ok(read)
            }
            Backing::Mem(contents) => {
                let contents = contents.lock();
                let offset = offset as usize;
                if offset >= contents.len() {
                    return Ok(0);
                }
                let n = buf.len().min(contents.len() - offset);
                buf[..n].copy_from_slice(&contents[offset..offset + n]);
                Ok(n)
            }
        }
    }

    pub fn sync(&self) -> io::Result<()> {
        match &self.backing {
            Backing::Disk(file) => file.sync_data(),
            Backing::Mem(_) => Ok(()),
        }
    }
}

impl io::Write for StoreFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
