//! # Revocation Error Types

use thiserror::Error;

use credo_crypto::CryptoError;

/// Errors from revocation-log operations.
#[derive(Error, Debug)]
pub enum RevocationError {
    /// `enable` on a log that already has a genesis record.
    #[error("revocation is already enabled for this credential type")]
    AlreadyEnabled,

    /// An operation that requires an enabled log.
    #[error("revocation is not enabled for this credential type")]
    NotEnabled,

    /// Incoming records do not extend the log contiguously.
    #[error("non-contiguous records: expected index {expected}, got {got}")]
    NonContiguous {
        /// The index the log expects next.
        expected: u64,
        /// The first incoming index.
        got: u64,
    },

    /// An incoming record's accumulator does not verify against its
    /// predecessor.
    #[error("accumulator chain verification failed at index {index}")]
    ChainVerification {
        /// The offending record index.
        index: u64,
    },

    /// `revoke` with a key that was never issued or is already revoked.
    #[error("unknown or already revoked revocation key {0:?}")]
    UnknownRevocationKey(String),

    /// Log file I/O failed.
    #[error("revocation log io error: {0}")]
    Io(#[from] std::io::Error),

    /// A log frame failed to (de)serialize.
    #[error("revocation log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Accumulator arithmetic failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A log frame is truncated or oversized.
    #[error("corrupt revocation log: {0}")]
    CorruptLog(String),
}
