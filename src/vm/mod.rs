//! The proposer-layer facade wrapping an inner chain VM.
//!
//! The facade owns the block store and the staking identity, supplies time
//! and reference-height oracles, and drives the decorated-block lifecycle:
//! wrap-and-sign on the build path, envelope decoding on the parse path,
//! and the commit/evict choreography on accept and reject.

mod handle;
mod window;

pub use handle::*;
pub use window::*;

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::consensus::{ChainBlock, ChainVm, ProposerBlock, ProposerHeader};
use crate::crypto::{Hash, NodeId, StakingIdentity};
use crate::errors::ChainResult;
use crate::storage::{BlockStore, Database};

/// Facade over an inner chain VM that wraps its blocks in signed proposer
/// headers.
pub struct ProposerVm {
    chain: Arc<dyn ChainVm>,
    window: Arc<dyn SubmissionWindow>,
    clock: Arc<dyn TimeSource>,
    identity: StakingIdentity,
    state: BlockStore,
    last_accepted: Mutex<Hash>,
}

impl ProposerVm {
    pub fn new(
        chain: Arc<dyn ChainVm>,
        window: Arc<dyn SubmissionWindow>,
        clock: Arc<dyn TimeSource>,
        identity: StakingIdentity,
        db: Arc<dyn Database>,
    ) -> Self {
        ProposerVm {
            chain,
            window,
            clock,
            identity,
            state: BlockStore::new(db),
            last_accepted: Mutex::new(Hash::zero()),
        }
    }

    pub fn state(&self) -> &BlockStore {
        &self.state
    }

    pub fn chain(&self) -> &dyn ChainVm {
        self.chain.as_ref()
    }

    pub fn window(&self) -> &dyn SubmissionWindow {
        self.window.as_ref()
    }

    pub fn clock(&self) -> &dyn TimeSource {
        self.clock.as_ref()
    }

    pub fn identity(&self) -> &StakingIdentity {
        &self.identity
    }

    pub fn node_id(&self) -> ChainResult<NodeId> {
        self.identity.node_id()
    }

    /// Wrap the inner chain's genesis block: zero parent, epoch timestamp,
    /// reference height zero, empty certificate. The wrapped genesis is
    /// committed and becomes the initial accepted tip.
    pub fn initialize(&self, genesis_inner_bytes: &[u8]) -> ChainResult<Arc<ProposerBlock>> {
        let inner = self.chain.parse_block(genesis_inner_bytes)?;
        let block = Arc::new(ProposerBlock::from_parts(
            ProposerHeader::genesis(),
            inner,
            None,
        )?);

        let known = self.state.get_by_id(&block.id(), self.chain.as_ref());
        if known.is_err() {
            self.state.cache(&block);
            self.state.commit(&block)?;
            info!(block = %block.id(), "initialized proposer chain at genesis");
        }
        self.set_last_accepted(block.id());
        Ok(block)
    }

    /// Wrap a freshly built inner block in a signed header on top of the
    /// current accepted tip, stamped with the wall clock and the reference
    /// chain's current height.
    pub fn build_block(&self, inner: Arc<dyn ChainBlock>) -> ChainResult<Arc<ProposerBlock>> {
        let header = ProposerHeader::new(
            self.last_accepted(),
            self.clock.now(),
            self.window.current_height(),
            self.identity.cert().clone(),
        );
        let block = Arc::new(ProposerBlock::signed(header, inner, &self.identity)?);
        self.state.cache(&block);
        debug!(block = %block.id(), parent = %block.parent_id(), "built proposer block");
        Ok(block)
    }

    /// Decode a received envelope, delegate inner parsing, and cache the
    /// reconstructed block.
    pub fn parse_block(&self, bytes: &[u8]) -> ChainResult<Arc<ProposerBlock>> {
        let (header, inner_bytes) = ProposerHeader::unmarshal(bytes)?;
        let inner = self.chain.parse_block(&inner_bytes)?;
        let block = Arc::new(ProposerBlock::from_parts(
            header,
            inner,
            Some(bytes.to_vec()),
        )?);
        self.state.cache(&block);
        Ok(block)
    }

    pub fn get_block(&self, id: &Hash) -> ChainResult<Arc<ProposerBlock>> {
        self.state.get_by_id(id, self.chain.as_ref())
    }

    pub fn get_block_by_inner(&self, inner_id: &Hash) -> ChainResult<Arc<ProposerBlock>> {
        self.state.get_by_inner_id(inner_id, self.chain.as_ref())
    }

    /// Run the full admission check for a block.
    pub fn verify_block(&self, block: &ProposerBlock) -> ChainResult<()> {
        block.verify(self)
    }

    /// Commit the block, accept its inner block, and move the tip. The
    /// parent's cache entry is evicted; it remains retrievable from the
    /// persistent store.
    pub fn accept_block(&self, block: &Arc<ProposerBlock>) -> ChainResult<()> {
        self.state.commit(block)?;
        block.accept(&self.state)?;
        self.set_last_accepted(block.id());
        info!(block = %block.id(), height = block.height(), "accepted block");
        Ok(())
    }

    /// Reject the decoration and evict it from the cache.
    ///
    /// This does not un-decide the inner block beyond what its own `reject`
    /// does; an inner block wrapped by several proposals stays live until
    /// its last decoration is decided.
    pub fn reject_block(&self, block: &Arc<ProposerBlock>) -> ChainResult<()> {
        block.reject(&self.state)?;
        debug!(block = %block.id(), "rejected block");
        Ok(())
    }

    /// Id of the most recently accepted decorated block.
    pub fn last_accepted(&self) -> Hash {
        *self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_last_accepted(&self, id: Hash) {
        *self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = id;
    }

    /// Consensus-facing handle for a block.
    pub fn block_handle(self: Arc<Self>, block: Arc<ProposerBlock>) -> ProposerBlockHandle {
        ProposerBlockHandle::new(self, block)
    }
}
