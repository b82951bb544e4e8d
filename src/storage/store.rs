//! Block store: write-through caches over two persistent namespaces.
//!
//! Decorated blocks are kept in an in-memory cache keyed by their id, with
//! an inverse index from inner-block id to decorated id. Persistence uses
//! two prefixed namespaces over one backing store, committed through the
//! write-staging layer so that both records land atomically or not at all.
//!
//! The store serializes every operation behind a single mutex; callers may
//! share it across threads, but the layer is designed to be driven by one
//! consensus loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::consensus::{ChainVm, ProposerBlock, ProposerHeader};
use crate::constants::{BLOCK_NAMESPACE, INNER_INDEX_NAMESPACE};
use crate::crypto::Hash;
use crate::errors::{ChainError, ChainResult};
use crate::storage::database::{namespaced, Database};
use crate::storage::version::VersionedDb;

struct StoreInner {
    db: VersionedDb,
    blocks: HashMap<Hash, Arc<ProposerBlock>>,
    inner_index: HashMap<Hash, Hash>,
}

impl StoreInner {
    fn evict(&mut self, id: &Hash) {
        if let Some(block) = self.blocks.remove(id) {
            self.inner_index.remove(&block.inner().id());
        }
    }
}

/// Cache plus persistent storage for decorated blocks.
pub struct BlockStore {
    inner: Mutex<StoreInner>,
}

impl BlockStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        BlockStore {
            inner: Mutex::new(StoreInner {
                db: VersionedDb::new(db),
                blocks: HashMap::new(),
                inner_index: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a block into both caches. Idempotent.
    pub fn cache(&self, block: &Arc<ProposerBlock>) {
        let mut inner = self.lock();
        inner.inner_index.insert(block.inner().id(), block.id());
        inner.blocks.insert(block.id(), block.clone());
    }

    /// Drop a block from both caches. No-op when absent. Persistent records
    /// are never removed; the store is append-only.
    pub fn evict(&self, id: &Hash) {
        let mut inner = self.lock();
        inner.evict(id);
        debug!(block = %id, "evicted from block cache");
    }

    /// True when the block is resident in the cache.
    pub fn contains(&self, id: &Hash) -> bool {
        self.lock().blocks.contains_key(id)
    }

    /// Persist a block's envelope and its inverse index entry as one atomic
    /// batch.
    ///
    /// On any failure the staging layer is aborted and the block is evicted
    /// from both caches: persistent state holds both records or neither,
    /// and the cache never diverges from it.
    pub fn commit(&self, block: &Arc<ProposerBlock>) -> ChainResult<()> {
        let mut inner = self.lock();
        let id = block.id();
        inner.db.put(
            namespaced(BLOCK_NAMESPACE, id.as_bytes()),
            block.bytes().to_vec(),
        );
        inner.db.put(
            namespaced(INNER_INDEX_NAMESPACE, block.inner().id().as_bytes()),
            id.as_bytes().to_vec(),
        );
        match inner.db.commit_batch() {
            Ok(()) => {
                debug!(block = %id, "committed block");
                Ok(())
            }
            Err(err) => {
                inner.db.abort();
                inner.evict(&id);
                Err(err)
            }
        }
    }

    /// Fetch a decorated block by id: cache first, then the persistent
    /// store, reconstructing and re-caching on a miss.
    pub fn get_by_id(&self, id: &Hash, chain: &dyn ChainVm) -> ChainResult<Arc<ProposerBlock>> {
        if let Some(block) = self.lock().blocks.get(id) {
            return Ok(block.clone());
        }

        let raw = self
            .lock()
            .db
            .get(&namespaced(BLOCK_NAMESPACE, id.as_bytes()))?
            .ok_or(ChainError::BlockNotFound)?;

        let (header, inner_bytes) = ProposerHeader::unmarshal(&raw)?;
        let inner = chain.parse_block(&inner_bytes)?;
        let block = Arc::new(ProposerBlock::from_parts(header, inner, Some(raw))?);
        self.cache(&block);
        Ok(block)
    }

    /// Fetch a decorated block by the id of its wrapped inner block.
    pub fn get_by_inner_id(
        &self,
        inner_id: &Hash,
        chain: &dyn ChainVm,
    ) -> ChainResult<Arc<ProposerBlock>> {
        let cached = self.lock().inner_index.get(inner_id).copied();
        let id = match cached {
            Some(id) => id,
            None => {
                let raw = self
                    .lock()
                    .db
                    .get(&namespaced(INNER_INDEX_NAMESPACE, inner_id.as_bytes()))?
                    .ok_or(ChainError::BlockNotFound)?;
                let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
                    ChainError::FailedParsing("invalid block id in inner index".into())
                })?;
                Hash::from_bytes(bytes)
            }
        };
        self.get_by_id(&id, chain)
    }

    /// Clear both caches without touching persistent state. Intended for
    /// tests that force the persistent read path.
    pub fn wipe_cache(&self) {
        let mut inner = self.lock();
        inner.blocks.clear();
        inner.inner_index.clear();
    }
}
