//! Consensus-facing view of a decorated block.
//!
//! The handle pairs a decorated block with its owning facade so that the
//! block satisfies the same contract as the inner blocks it wraps. Parent
//! resolution falls back to the missing-block sentinel instead of failing;
//! callers must not treat the sentinel as a verified parent.

use std::sync::Arc;

use crate::consensus::{
    BlockStatus, ChainBlock, MissingBlock, OracleBlock, ProposerBlock, ProposerHeader,
};
use crate::crypto::Hash;
use crate::errors::ChainResult;
use crate::vm::ProposerVm;

/// A decorated block bound to its facade.
#[derive(Clone)]
pub struct ProposerBlockHandle {
    vm: Arc<ProposerVm>,
    block: Arc<ProposerBlock>,
}

impl ProposerBlockHandle {
    pub fn new(vm: Arc<ProposerVm>, block: Arc<ProposerBlock>) -> Self {
        ProposerBlockHandle { vm, block }
    }

    pub fn block(&self) -> &Arc<ProposerBlock> {
        &self.block
    }

    pub fn header(&self) -> &ProposerHeader {
        self.block.header()
    }

    /// The decorated parent, or the missing-block sentinel when the parent
    /// is unknown. Never fails.
    pub fn parent(&self) -> Arc<dyn ChainBlock> {
        match self.vm.get_block(&self.block.parent_id()) {
            Ok(parent) => Arc::new(ProposerBlockHandle::new(self.vm.clone(), parent)),
            Err(_) => Arc::new(MissingBlock::new(self.block.parent_id())),
        }
    }
}

impl ChainBlock for ProposerBlockHandle {
    fn id(&self) -> Hash {
        self.block.id()
    }

    fn bytes(&self) -> Vec<u8> {
        self.block.bytes().to_vec()
    }

    fn parent_id(&self) -> Hash {
        self.block.parent_id()
    }

    fn height(&self) -> u64 {
        self.block.height()
    }

    fn timestamp(&self) -> i64 {
        self.block.timestamp()
    }

    fn verify(&self) -> ChainResult<()> {
        self.block.verify(&self.vm)
    }

    fn accept(&self) -> ChainResult<()> {
        self.vm.accept_block(&self.block)
    }

    fn reject(&self) -> ChainResult<()> {
        self.vm.reject_block(&self.block)
    }

    fn status(&self) -> BlockStatus {
        self.block.status()
    }

    fn as_oracle(&self) -> Option<&dyn OracleBlock> {
        if self.block.is_oracle() {
            Some(self)
        } else {
            None
        }
    }
}

impl OracleBlock for ProposerBlockHandle {
    fn options(&self) -> ChainResult<[Arc<dyn ChainBlock>; 2]> {
        self.block.options()
    }
}
