//! Cryptography module - SHA-256 identifiers, proposer certificates, and the
//! staking identity.

mod cert;
mod hash;

pub use cert::*;
pub use hash::*;
