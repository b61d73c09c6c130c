//! Sled-backed object and ref stores.

use super::{content_hash, ObjectStore, RefStore};
use crate::error::StorageError;
use crate::types::{to_hex, Hash};
use tracing::trace;
use std::path::Path;

const OBJECTS_TREE: &str = "objects";
const REFS_TREE: &str = "refs";

/// Open (or create) the sled database at `path` and return both stores.
pub fn open_sled_stores(path: &Path) -> Result<(SledObjectStore, SledRefStore), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = sled::open(path)?;
    tracing::debug!(path = %path.display(), "Opened sled database");
    Ok((
        SledObjectStore::from_db(&db)?,
        SledRefStore::from_db(&db)?,
    ))
}

/// Object store persisted in the `objects` tree of a sled database.
pub struct SledObjectStore {
    tree: sled::Tree,
}

impl SledObjectStore {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(OBJECTS_TREE)?,
        })
    }
}

impl ObjectStore for SledObjectStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash, StorageError> {
        let hash = content_hash(bytes);
        if self
            .tree
            .compare_and_swap(hash, None::<&[u8]>, Some(bytes))?
            .is_err()
        {
            trace!(object = %to_hex(&hash), "Object already stored");
        }
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        let bytes = self
            .tree
            .get(hash)?
            .ok_or(StorageError::NotFound(*hash))?;
        let actual = content_hash(&bytes);
        if actual != *hash {
            return Err(StorageError::CorruptObject {
                expected: *hash,
                actual,
            });
        }
        Ok(bytes.to_vec())
    }

    fn contains(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.tree.contains_key(hash)?)
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.tree.len())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}

/// Ref store persisted in the `refs` tree of a sled database.
pub struct SledRefStore {
    tree: sled::Tree,
}

impl SledRefStore {
    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(REFS_TREE)?,
        })
    }
}

impl RefStore for SledRefStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tree.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, StorageError> {
        let outcome = self.tree.compare_and_swap(key.as_bytes(), expected, new)?;
        Ok(outcome.is_ok())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let mut records = Vec::new();
        for entry in self.tree.scan_prefix(prefix.as_bytes()) {
            let (key, value) = entry?;
            let key = String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::Serialization(format!("Non UTF-8 ref key: {}", e))
            })?;
            records.push((key, value.to_vec()));
        }
        Ok(records)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}
