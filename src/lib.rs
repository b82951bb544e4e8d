//! SIGIL Proposer Layer Core Library
//!
//! SIGIL decorates the blocks of an inner consensus VM with signed proposer
//! headers: each block carries its proposer's X.509 certificate, a
//! submission timestamp, and a reference height into a secondary chain that
//! resolves the proposer set. The layer enforces per-proposer submission
//! windows, binds blocks to proposer identity, and persists decorated
//! blocks in a content-addressed store with an inverse index from inner
//! block id to decorated block id.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod errors;
pub mod storage;
pub mod vm;

/// Protocol constants. Fixed by the wire format and the admission rules;
/// never configurable.
pub mod constants {
    use std::time::Duration;

    /// Allowed clock skew: a block's timestamp may not exceed local time by
    /// more than this.
    pub const SUBMISSION_TOLERANCE: Duration = Duration::from_secs(10);

    /// Length of one proposer's submission slot. Exported for schedulers;
    /// block verification itself only enforces the window start and the
    /// tolerance ceiling.
    pub const SUBMISSION_WINDOW: Duration = Duration::from_secs(2);

    /// Envelope version understood by this implementation.
    pub const PROPOSER_VERSION: u16 = 0;

    /// Hard cap on the encoded size of a decorated block.
    pub const MAX_ENVELOPE_SIZE: usize = 1 << 18;

    /// Persistent namespace holding envelope bytes keyed by decorated
    /// block id.
    pub const BLOCK_NAMESPACE: &[u8] = b"block";

    /// Persistent namespace mapping inner block id to decorated block id.
    pub const INNER_INDEX_NAMESPACE: &[u8] = b"wrpdToProID";
}
