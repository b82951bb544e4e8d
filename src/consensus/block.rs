//! Decorated blocks: an inner consensus block wrapped in a signed proposer
//! header.
//!
//! A decorated block binds the wrapped bytes to the proposer's certificate
//! and to a submission time, and is admitted only inside the proposer's
//! per-height submission window.

use std::sync::Arc;

use tracing::debug;

use crate::consensus::chain::{BlockStatus, ChainBlock, OracleBlock};
use crate::consensus::header::ProposerHeader;
use crate::constants::{PROPOSER_VERSION, SUBMISSION_TOLERANCE};
use crate::crypto::{hash_bytes, Hash, StakingIdentity};
use crate::errors::{ChainError, ChainResult};
use crate::storage::BlockStore;
use crate::vm::ProposerVm;

/// An inner block decorated with a signed proposer header.
///
/// `bytes` is the canonical envelope over the header and the inner block's
/// bytes; `id` is its SHA-256. Both are fixed at construction.
pub struct ProposerBlock {
    header: ProposerHeader,
    inner: Arc<dyn ChainBlock>,
    bytes: Vec<u8>,
    id: Hash,
}

impl ProposerBlock {
    /// Build and sign a new proposal.
    ///
    /// The staking key signs the SHA-256 digest of the envelope encoded with
    /// an empty signature field; the signature is then emitted into the
    /// header and the envelope recomputed.
    pub fn signed(
        mut header: ProposerHeader,
        inner: Arc<dyn ChainBlock>,
        identity: &StakingIdentity,
    ) -> ChainResult<Self> {
        header.set_signature(Vec::new());
        let inner_bytes = inner.bytes();
        let digest = hash_bytes(&header.unsigned_envelope(&inner_bytes)?);
        header.set_signature(identity.sign_digest(&digest));

        let bytes = header.envelope(&inner_bytes)?;
        let id = hash_bytes(&bytes);
        Ok(ProposerBlock {
            header,
            inner,
            bytes,
            id,
        })
    }

    /// Reconstruct a decorated block without signing, either from received
    /// envelope bytes or by re-encoding the header's existing signature.
    pub fn from_parts(
        header: ProposerHeader,
        inner: Arc<dyn ChainBlock>,
        bytes: Option<Vec<u8>>,
    ) -> ChainResult<Self> {
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => header.envelope(&inner.bytes())?,
        };
        let id = hash_bytes(&bytes);
        Ok(ProposerBlock {
            header,
            inner,
            bytes,
            id,
        })
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    /// Canonical envelope bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> &ProposerHeader {
        &self.header
    }

    pub fn parent_id(&self) -> Hash {
        self.header.parent_id()
    }

    pub fn inner(&self) -> &Arc<dyn ChainBlock> {
        &self.inner
    }

    /// Inner-block height (not the reference height in the header).
    pub fn height(&self) -> u64 {
        self.inner.height()
    }

    /// Inner-block timestamp, independent of the header timestamp.
    pub fn timestamp(&self) -> i64 {
        self.inner.timestamp()
    }

    pub fn status(&self) -> BlockStatus {
        self.inner.status()
    }

    /// Check the block against the admission rules, halting at the first
    /// failure: version, inner validity, parent presence, reference-height
    /// bounds, timestamp ordering, node address derivation, window start,
    /// clock-skew ceiling, and finally the header signature.
    pub fn verify(&self, vm: &ProposerVm) -> ChainResult<()> {
        if self.header.version() != PROPOSER_VERSION {
            return Err(ChainError::FailedParsing(format!(
                "unknown proposer version {}",
                self.header.version()
            )));
        }

        self.inner.verify()?;

        let parent = vm
            .state()
            .get_by_id(&self.header.parent_id(), vm.chain())
            .map_err(|_| ChainError::BlockNotFound)?;

        if self.header.ref_height() < parent.header.ref_height() {
            return Err(ChainError::WrongHeight);
        }
        if self.header.ref_height() > vm.window().current_height() {
            return Err(ChainError::WrongHeight);
        }

        if self.header.timestamp() < parent.header.timestamp() {
            return Err(ChainError::BadTimestamp);
        }

        let node_id = self.header.cert().node_id()?;

        let delay = vm
            .window()
            .submission_delay(self.header.ref_height(), &node_id);
        let window_start = parent
            .header
            .timestamp()
            .saturating_add(delay.as_secs() as i64);
        if self.header.timestamp() < window_start {
            debug!(
                block = %self.id,
                node = %node_id,
                window_start,
                timestamp = self.header.timestamp(),
                "block submitted before its window"
            );
            return Err(ChainError::BadTimestamp);
        }

        let horizon = vm
            .clock()
            .now()
            .saturating_add(SUBMISSION_TOLERANCE.as_secs() as i64);
        if self.header.timestamp() > horizon {
            return Err(ChainError::BadTimestamp);
        }

        let digest = hash_bytes(&self.header.unsigned_envelope(&self.inner.bytes())?);
        self.header
            .cert()
            .verify_digest(&digest, self.header.signature())
            .map_err(|_| ChainError::InvalidSignature)
    }

    /// Accept the inner block. On success the parent's cache entry is
    /// evicted; it is no longer needed for verification.
    pub fn accept(&self, store: &BlockStore) -> ChainResult<()> {
        self.inner.accept()?;
        store.evict(&self.header.parent_id());
        Ok(())
    }

    /// Reject the inner block and evict this block from the cache.
    ///
    /// Rejecting a decorated block only rejects the decoration: the inner
    /// block's semantic state changes no further than its own `reject` does.
    pub fn reject(&self, store: &BlockStore) -> ChainResult<()> {
        self.inner.reject()?;
        store.evict(&self.id);
        Ok(())
    }

    /// Child options, when the inner block is an oracle.
    pub fn options(&self) -> ChainResult<[Arc<dyn ChainBlock>; 2]> {
        match self.inner.as_oracle() {
            Some(oracle) => oracle.options(),
            None => Err(ChainError::NotOracle),
        }
    }

    pub fn is_oracle(&self) -> bool {
        self.inner.as_oracle().is_some()
    }
}

impl std::fmt::Debug for ProposerBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposerBlock")
            .field("id", &self.id)
            .field("parent", &self.header.parent_id())
            .field("ref_height", &self.header.ref_height())
            .field("timestamp", &self.header.timestamp())
            .finish()
    }
}
