//! The inner-block contract consumed and re-exposed by the proposer layer.
//!
//! The proposer layer decorates blocks produced by an inner consensus VM. It
//! only relies on the small capability set below; everything else about the
//! inner chain is opaque.

use std::sync::Arc;

use crate::crypto::Hash;
use crate::errors::{ChainError, ChainResult};

/// Where a block stands in its decision lifecycle.
///
/// Ids move linearly: `Unknown` → `Processing` → `Accepted` or `Rejected`.
/// Cache eviction does not move a block backwards; committed blocks stay
/// retrievable from persistent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Unknown,
    Processing,
    Accepted,
    Rejected,
}

impl BlockStatus {
    pub fn is_decided(&self) -> bool {
        matches!(self, BlockStatus::Accepted | BlockStatus::Rejected)
    }
}

/// A consensus block as seen by the proposer layer.
///
/// `accept` and `reject` take `&self`: implementations record their decision
/// behind interior mutability because parsed blocks are shared.
pub trait ChainBlock: Send + Sync {
    /// Content-addressed identifier of this block.
    fn id(&self) -> Hash;

    /// Canonical serialized form.
    fn bytes(&self) -> Vec<u8>;

    /// Identifier of the parent block.
    fn parent_id(&self) -> Hash;

    fn height(&self) -> u64;

    /// Block time in seconds since the epoch. Independent of any decoration
    /// the proposer layer adds.
    fn timestamp(&self) -> i64;

    /// Check semantic validity against the inner chain's own rules.
    fn verify(&self) -> ChainResult<()>;

    /// Mark the block as the decided choice at its height.
    fn accept(&self) -> ChainResult<()>;

    /// Mark the block as not chosen.
    fn reject(&self) -> ChainResult<()>;

    fn status(&self) -> BlockStatus;

    /// Capability probe: blocks that can propose child options return
    /// themselves as an oracle.
    fn as_oracle(&self) -> Option<&dyn OracleBlock> {
        None
    }
}

/// Optional capability for blocks that fork into exactly two child options.
pub trait OracleBlock: ChainBlock {
    fn options(&self) -> ChainResult<[Arc<dyn ChainBlock>; 2]>;
}

/// The inner consensus VM: the only operation the proposer layer needs from
/// it is parsing block bytes it has wrapped or stored.
pub trait ChainVm: Send + Sync {
    fn parse_block(&self, bytes: &[u8]) -> ChainResult<Arc<dyn ChainBlock>>;
}

/// Sentinel standing in for a block the node has never seen.
///
/// Returned by parent lookups instead of an error. It fails verification, so
/// callers cannot mistake it for a resolved, verified parent.
#[derive(Debug, Clone)]
pub struct MissingBlock {
    id: Hash,
}

impl MissingBlock {
    pub fn new(id: Hash) -> Self {
        MissingBlock { id }
    }
}

impl ChainBlock for MissingBlock {
    fn id(&self) -> Hash {
        self.id
    }

    fn bytes(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parent_id(&self) -> Hash {
        Hash::zero()
    }

    fn height(&self) -> u64 {
        0
    }

    fn timestamp(&self) -> i64 {
        0
    }

    fn verify(&self) -> ChainResult<()> {
        Err(ChainError::BlockNotFound)
    }

    fn accept(&self) -> ChainResult<()> {
        Err(ChainError::BlockNotFound)
    }

    fn reject(&self) -> ChainResult<()> {
        Err(ChainError::BlockNotFound)
    }

    fn status(&self) -> BlockStatus {
        BlockStatus::Unknown
    }
}
