//! sled-backed implementation of the byte store.

use std::path::Path;

use crate::errors::ChainResult;
use crate::storage::database::{Database, WriteBatch};

/// Durable store over a single sled tree.
#[derive(Debug, Clone)]
pub struct SledDb {
    db: sled::Db,
}

impl SledDb {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> ChainResult<Self> {
        let db = sled::open(path)?;
        Ok(SledDb { db })
    }
}

impl Database for SledDb {
    fn get(&self, key: &[u8]) -> ChainResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> ChainResult<()> {
        self.db.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn write_batch(&self, batch: WriteBatch) -> ChainResult<()> {
        let mut sled_batch = sled::Batch::default();
        for (key, value) in batch.into_ops() {
            sled_batch.insert(key, value);
        }
        self.db.apply_batch(sled_batch)?;
        self.db.flush()?;
        Ok(())
    }
}
