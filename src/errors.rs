use std::io;

use thiserror::Error;

/// Crate-wide error type.
///
/// The proposer layer surfaces every failure to the caller; nothing is
/// retried internally. Inner-block errors travel through the same type so
/// they cross the layer unchanged.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("proposer block not found")]
    BlockNotFound,
    #[error("could not parse proposer block: {0}")]
    FailedParsing(String),
    #[error("proposer block timestamp outside tolerance window")]
    BadTimestamp,
    #[error("proposer block has wrong reference height")]
    WrongHeight,
    #[error("invalid staking key: {0}")]
    InvalidStakingKey(String),
    #[error("could not derive node id from proposer certificate")]
    InvalidNodeId,
    #[error("proposer block signature does not verify")]
    InvalidSignature,
    #[error("inner block does not expose options")]
    NotOracle,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("inner block error: {0}")]
    InnerBlock(String),
}

impl From<sled::Error> for ChainError {
    fn from(err: sled::Error) -> Self {
        ChainError::Storage(err.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
