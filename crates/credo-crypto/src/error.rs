//! # Crypto Error Types

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A required modular inverse does not exist.
    #[error("no modular inverse for {context}")]
    NoInverse {
        /// What was being inverted.
        context: &'static str,
    },

    /// Proof verification failed.
    #[error("proof verification failed: {0}")]
    ProofVerification(String),

    /// A signature does not verify against its attributes.
    #[error("signature verification failed")]
    SignatureVerification,

    /// The witness prime has been removed from the accumulator, so the
    /// witness can no longer be updated.
    #[error("witness prime has been revoked")]
    WitnessRevoked,

    /// An attribute integer exceeds the message space.
    #[error("attribute exceeds message space ({bits} bits)")]
    AttributeTooLarge {
        /// The configured message-space size.
        bits: usize,
    },

    /// Malformed key material.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
}
