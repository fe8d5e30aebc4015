//! Pluggable blob storage for externally stored content payloads
//!
//! The engine only ever sees opaque names; how bytes are laid out on disk
//! (or elsewhere) is the store's concern.

use crate::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Blob storage used for content payloads kept outside the record maps
pub trait ContentStore: Send + Sync {
    /// Store `data` under `name`, overwriting any previous payload
    fn store(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Fetch the payload stored under `name`
    fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    /// Delete the payload stored under `name`. Deleting a missing payload
    /// is an error so callers can decide whether to tolerate it.
    fn delete(&self, name: &str) -> Result<()>;
}

/// Filesystem-backed store: one file per blob under a root directory
#[derive(Debug)]
pub struct DiskContentStore {
    root: PathBuf,
}

impl DiskContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::Storage(format!("failed to create blob directory: {e}")))?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        // Names are generated internally, but a store may be fed externally
        // persisted references; refuse anything that escapes the root.
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(Error::Storage(format!("invalid blob name '{name}'")));
        }
        Ok(self.root.join(name))
    }
}

impl ContentStore for DiskContentStore {
    fn store(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        std::fs::write(&path, data)
            .map_err(|e| Error::Storage(format!("failed to write blob '{name}': {e}")))?;
        debug!(blob = name, bytes = data.len(), "stored blob");
        Ok(())
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        std::fs::read(&path)
            .map_err(|e| Error::Storage(format!("failed to read blob '{name}': {e}")))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        std::fs::remove_file(&path)
            .map_err(|e| Error::Storage(format!("failed to delete blob '{name}': {e}")))
    }
}

/// In-memory store for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentStore for MemoryContentStore {
    fn store(&self, name: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| Error::Storage("blob map lock poisoned".to_string()))?;
        blobs.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| Error::Storage("blob map lock poisoned".to_string()))?;
        blobs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("blob '{name}' not found")))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| Error::Storage("blob map lock poisoned".to_string()))?;
        blobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("blob '{name}' not found")))
    }
}
