//! Object and Ref Stores
//!
//! The object store is content-addressed: every blob is keyed by the BLAKE3
//! digest of its bytes, so `put` is idempotent and identical snapshots,
//! values and commits share storage. The ref store holds the few mutable
//! records of the engine (branch heads, commit annotations) and exposes a
//! compare-and-swap primitive so that every mutation is a single atomic step.

pub mod persistence;

pub use persistence::{SledObjectStore, SledRefStore};

use crate::error::StorageError;
use crate::types::Hash;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Compute the content hash used as object identity.
pub fn content_hash(bytes: &[u8]) -> Hash {
    *blake3::hash(bytes).as_bytes()
}

/// Content-addressed object storage.
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` and return their content hash. Storing the same bytes
    /// again returns the same hash and does not duplicate storage.
    fn put(&self, bytes: &[u8]) -> Result<Hash, StorageError>;

    /// Load the bytes stored under `hash`, failing with `NotFound`.
    fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError>;

    fn contains(&self, hash: &Hash) -> Result<bool, StorageError>;

    /// Number of distinct objects held.
    fn len(&self) -> Result<usize, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Flush any buffered writes to disk. Default implementation is a no-op.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Mutable named records with atomic compare-and-swap.
pub trait RefStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the value under `key` with `new` only if it currently equals
    /// `expected` (`None` meaning absent). Returns false when the current
    /// value did not match; nothing is written in that case.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, StorageError>;

    /// All records whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<Hash, Arc<[u8]>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash, StorageError> {
        let hash = content_hash(bytes);
        if self.objects.read().contains_key(&hash) {
            return Ok(hash);
        }
        // Insert-if-absent: a concurrent writer of the same content may win.
        self.objects
            .write()
            .entry(hash)
            .or_insert_with(|| Arc::from(bytes));
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .get(hash)
            .map(|bytes| bytes.to_vec())
            .ok_or(StorageError::NotFound(*hash))
    }

    fn contains(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.objects.read().contains_key(hash))
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.objects.read().len())
    }
}

/// In-memory ref store.
#[derive(Default)]
pub struct MemoryRefStore {
    refs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for MemoryRefStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.refs.read().get(key).cloned())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Option<&[u8]>,
    ) -> Result<bool, StorageError> {
        let mut refs = self.refs.write();
        if refs.get(key).map(|v| v.as_slice()) != expected {
            return Ok(false);
        }
        match new {
            Some(value) => {
                refs.insert(key.to_string(), value.to_vec());
            }
            None => {
                refs.remove(key);
            }
        }
        Ok(true)
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        Ok(self
            .refs
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
