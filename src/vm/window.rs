//! Time and submission-window oracles.
//!
//! The submission window decides when each proposer may submit a block on
//! top of a given parent: a per-(reference height, node) delay since the
//! parent's timestamp. The oracle is pure; the embedding node feeds it the
//! reference chain's current height.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::SUBMISSION_WINDOW;
use crate::crypto::NodeId;

/// Source of wall-clock time, in seconds since the epoch.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// Oracle for the reference chain height and per-proposer submission delays.
pub trait SubmissionWindow: Send + Sync {
    /// Height of the reference chain as of now. Headers may not reference a
    /// height beyond this.
    fn current_height(&self) -> u64;

    /// Minimum interval since the parent's timestamp before `node` may
    /// submit at `ref_height`.
    fn submission_delay(&self, ref_height: u64, node: &NodeId) -> Duration;
}

/// Submission windows over a static proposer set, rotated by reference
/// height.
///
/// At each height the rotation shifts by one: the scheduled proposer gets a
/// zero delay, the next one waits one window, and so on. Nodes outside the
/// set wait out the whole rotation.
pub struct RoundRobinWindow {
    proposers: Vec<NodeId>,
    height: AtomicU64,
}

impl RoundRobinWindow {
    pub fn new(proposers: Vec<NodeId>) -> Self {
        RoundRobinWindow {
            proposers,
            height: AtomicU64::new(0),
        }
    }

    /// Advance the observed reference-chain height.
    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }
}

impl SubmissionWindow for RoundRobinWindow {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn submission_delay(&self, ref_height: u64, node: &NodeId) -> Duration {
        if self.proposers.is_empty() {
            return Duration::ZERO;
        }
        let len = self.proposers.len() as u64;
        match self.proposers.iter().position(|p| p == node) {
            Some(pos) => {
                let slot = (pos as u64 + len - ref_height % len) % len;
                SUBMISSION_WINDOW * slot as u32
            }
            None => SUBMISSION_WINDOW * len as u32,
        }
    }
}
