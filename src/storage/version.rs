//! Write-staging layer over the byte store.
//!
//! Writes accumulate in memory across namespaces and land in the backing
//! store as one atomic batch. Readers that go through this layer observe
//! staged writes; the backing store observes nothing until `commit_batch`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ChainResult;
use crate::storage::database::{Database, WriteBatch};

/// Buffered view of a `Database` with atomic batch commit.
pub struct VersionedDb {
    base: Arc<dyn Database>,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl VersionedDb {
    pub fn new(base: Arc<dyn Database>) -> Self {
        VersionedDb {
            base,
            staged: BTreeMap::new(),
        }
    }

    /// Read through the staged writes, falling back to the backing store.
    pub fn get(&self, key: &[u8]) -> ChainResult<Option<Vec<u8>>> {
        if let Some(value) = self.staged.get(key) {
            return Ok(Some(value.clone()));
        }
        self.base.get(key)
    }

    /// Stage a write; nothing reaches the backing store yet.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key, value);
    }

    /// Apply every staged write as one atomic batch.
    ///
    /// On success the staging buffer is empty; on failure it is left intact
    /// and the backing store is unchanged (atomicity of `write_batch`).
    pub fn commit_batch(&mut self) -> ChainResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for (key, value) in &self.staged {
            batch.put(key.clone(), value.clone());
        }
        self.base.write_batch(batch)?;
        self.staged.clear();
        Ok(())
    }

    /// Drop all staged writes. Idempotent, and a no-op after a successful
    /// `commit_batch`.
    pub fn abort(&mut self) {
        self.staged.clear();
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }
}
