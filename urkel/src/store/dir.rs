//! The store directory: file naming, creation, recovery scans, fsync.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use parking_lot::Mutex;

use super::file::{MemFile, StoreFile};
use crate::error::{Error, Result};

/// Extension shared by every store file.
const DB_FORMAT: &str = "udb";

pub(crate) fn file_name(prefix: &str, index: u32) -> String {
    format!("{}-{}.{}", prefix, index, DB_FORMAT)
}

/// Extract `N` from a `{prefix}-N.udb` name; `None` for anything else.
fn parse_index(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_suffix(DB_FORMAT)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

enum Backing {
    Disk { path: PathBuf, fd: File },
    Mem { files: Mutex<HashMap<String, MemFile>> },
}

/// Handle to the directory holding the store's files.
///
/// An empty path selects the in-memory backend: the registry below plays the
/// role of the directory and fsync becomes a no-op.
pub(crate) struct Dir {
    backing: Backing,
    dirty: AtomicBool,
}

impl Dir {
    pub fn open(path: &Path) -> Result<Arc<Dir>> {
        let backing = if path.as_os_str().is_empty() {
            Backing::Mem {
                files: Mutex::new(HashMap::new()),
            }
        } else {
            fs::create_dir_all(path)
                .map_err(|e| Error::io(format!("create dir {}", path.display()), e))?;
            let fd = File::open(path)
                .map_err(|e| Error::io(format!("open dir {}", path.display()), e))?;
            Backing::Disk {
                path: path.to_path_buf(),
                fd,
            }
        };
        Ok(Arc::new(Dir {
            backing,
            dirty: AtomicBool::new(false),
        }))
    }

    /// Open (creating if needed) the file `{prefix}-{index}.udb`.
    ///
    /// Marks the directory dirty so the next commit fsyncs the new entry.
    pub fn open_file(&self, prefix: &str, index: u32) -> Result<StoreFile> {
        let name = file_name(prefix, index);
        self.dirty.store(true, Ordering::Release);
        match &self.backing {
            Backing::Disk { path, .. } => {
                let full = path.join(&name);
                let fd = OpenOptions::new()
                    .create(true)
                    .read(true)
                    .append(true)
                    .open(&full)
                    .map_err(|e| Error::io(format!("open {}", full.display()), e))?;
                Ok(StoreFile::disk(name, fd))
            }
            Backing::Mem { files } => {
                let contents = files.lock().entry(name.clone()).or_default().clone();
                Ok(StoreFile::mem(name, contents))
            }
        }
    }

    /// The highest index among existing `{prefix}-N.udb` files, 0 if none.
    pub fn last_index(&self, prefix: &str) -> Result<u32> {
        let mut max = 0;
        match &self.backing {
            Backing::Disk { path, .. } => {
                let entries = fs::read_dir(path)
                    .map_err(|e| Error::io(format!("scan dir {}", path.display()), e))?;
                for entry in entries {
                    let entry =
                        entry.map_err(|e| Error::io(format!("scan dir {}", path.display()), e))?;
                    if let Some(index) = entry
                        .file_name()
                        .to_str()
                        .and_then(|name| parse_index(name, prefix))
                    {
                        max = max.max(index);
                    }
                }
            }
            Backing::Mem { files } => {
                for name in files.lock().keys() {
                    if let Some(index) = parse_index(name, prefix) {
                        max = max.max(index);
                    }
                }
            }
        }
        Ok(max)
    }

    /// Fsync the directory if files were created since the last commit.
    pub fn commit(&self) -> Result<()> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            if let Backing::Disk { path, fd } = &self.backing {
                fd.sync_all()
                    .map_err(|e| Error::io(format!("fsync dir {}", path.display()), e))?;
            }
        }
        Ok(())
    }
}
