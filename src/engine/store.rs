//! SILT - Object Store
//! The durable home of flushed segments. Writes are create-only: an
//! object path can be written exactly once, so a flushed segment is
//! never overwritten in place.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{Result, SiltError};
use crate::types::SegmentId;

/// Object path of a persisted segment.
pub fn segment_path(id: SegmentId) -> String {
    format!("{id}.segment")
}

/// Storage backend for persisted segments.
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path`. Fails with [`SiltError::SegmentExists`]
    /// if the path is already present.
    fn set(&self, path: &str, data: Bytes) -> Result<()>;

    /// Read the full object at `path`.
    fn get(&self, path: &str) -> Result<Bytes>;

    /// Read `len` bytes starting at `offset`.
    fn get_range(&self, path: &str, offset: u64, len: u64) -> Result<Bytes>;

    /// Size of the object at `path` in bytes.
    fn size_in_bytes(&self, path: &str) -> Result<u64>;

    /// Paths of all stored objects.
    fn list(&self) -> Result<Vec<String>>;
}

/// In-memory object store for tests and benchmarks.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn set(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write();
        if objects.contains_key(path) {
            return Err(SiltError::SegmentExists(path.to_string()));
        }
        objects.insert(path.to_string(), data);
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Bytes> {
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| missing(path))
    }

    fn get_range(&self, path: &str, offset: u64, len: u64) -> Result<Bytes> {
        let object = self.get(path)?;
        let start = offset as usize;
        let end = start.saturating_add(len as usize);
        if end > object.len() {
            return Err(SiltError::Corruption(format!(
                "range {offset}+{len} out of bounds for {path}"
            )));
        }
        Ok(object.slice(start..end))
    }

    fn size_in_bytes(&self, path: &str) -> Result<u64> {
        Ok(self.get(path)?.len() as u64)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.objects.read().keys().cloned().collect())
    }
}

/// File-backed object store rooted at a directory.
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn object(&self, path: &str) -> PathBuf {
        self.dir.join(path)
    }
}

impl ObjectStore for DiskStore {
    fn set(&self, path: &str, data: Bytes) -> Result<()> {
        let target = self.object(path);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(SiltError::SegmentExists(path.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Bytes> {
        Ok(Bytes::from(std::fs::read(self.object(path))?))
    }

    fn get_range(&self, path: &str, offset: u64, len: u64) -> Result<Bytes> {
        let mut file = File::open(self.object(path))?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn size_in_bytes(&self, path: &str) -> Result<u64> {
        Ok(std::fs::metadata(self.object(path))?.len())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut paths = vec![];
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                paths.push(name.to_string());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

fn missing(path: &str) -> SiltError {
    SiltError::Io(std::sync::Arc::new(std::io::Error::new(
        ErrorKind::NotFound,
        format!("no object at {path}"),
    )))
}
