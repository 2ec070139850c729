//! Blob store for raw report bytes and archived results.

use std::path::{Path, PathBuf};

use super::StoreError;

pub trait ObjectStore: Send + Sync {
    fn get(&self, store_ref: &str, key: &str) -> Result<Vec<u8>, StoreError>;
    fn put(&self, store_ref: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Filesystem-backed object store: each `store_ref` is a directory under the
/// root, keys map to relative paths beneath it.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, store_ref: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(store_ref)?;
        validate_key(key)?;
        Ok(self.root.join(store_ref).join(key))
    }
}

/// Keys are relative paths; anything that could escape the store root is
/// rejected before touching the filesystem.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let path = Path::new(key);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
    if key.is_empty() || escapes {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl ObjectStore for FsObjectStore {
    fn get(&self, store_ref: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(store_ref, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound {
                    store_ref: store_ref.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, store_ref: &str, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(store_ref, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(())
    }
}
