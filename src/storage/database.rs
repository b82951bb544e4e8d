//! The opaque byte store underneath the proposer layer.
//!
//! The layer only needs point reads, point writes, and an atomic batched
//! write; everything else about the backing store is out of scope. The
//! in-memory implementation backs unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::errors::{ChainError, ChainResult};

/// An ordered set of writes applied as a unit.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.ops
    }
}

/// Minimal keyed byte store.
///
/// `write_batch` must be atomic: either every write in the batch becomes
/// visible or none does.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> ChainResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> ChainResult<()>;

    fn write_batch(&self, batch: WriteBatch) -> ChainResult<()>;
}

/// Prefix a key with a namespace tag.
pub fn namespaced(namespace: &[u8], key: &[u8]) -> Vec<u8> {
    [namespace, key].concat()
}

/// In-memory store over a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryDb {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        MemoryDb::default()
    }

    fn lock(&self) -> ChainResult<std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| ChainError::Storage("memory store poisoned".into()))
    }
}

impl Database for MemoryDb {
    fn get(&self, key: &[u8]) -> ChainResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> ChainResult<()> {
        self.lock()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> ChainResult<()> {
        let mut entries = self.lock()?;
        for (key, value) in batch.into_ops() {
            entries.insert(key, value);
        }
        Ok(())
    }
}
