//! # credo-crypto — Camenisch–Lysyanskaya Primitives
//!
//! The cryptographic substrate of the credo server: RSA-group issuer keys,
//! CL signatures over attribute integer vectors, the zero-knowledge proofs
//! exchanged during disclosure and issuance (`ProofD`, `ProofU`, with
//! keyshare contributions as `ProofP`), and the RSA-B accumulator backing
//! credential revocation.
//!
//! Both the prover and verifier sides are implemented: the server only
//! verifies and issues, but wallets (and the test suite) build proofs with
//! the same arithmetic, and keeping the two sides next to each other is
//! what keeps them honest.
//!
//! ## Conventions
//!
//! - All group arithmetic is mod `n`, an RSA modulus of two safe primes.
//! - Schnorr responses are computed over the integers (no reduction), with
//!   commitment randomness sized to statistically hide the witnesses.
//! - Fiat–Shamir challenges hash length-prefixed big-endian encodings of
//!   the public values and commitments, in order.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `credo-*` crates.
//! - No `unwrap()`/`expect()` outside tests; arithmetic that can fail
//!   (modular inverses) surfaces `CryptoError`.

pub mod accumulator;
pub mod bignum;
pub mod credential;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod proofs;
pub mod signature;

pub use accumulator::{
    Accumulator, EventKind, RevocationPrivateKey, RevocationPublicKey, RevocationRecord, Witness,
};
pub use credential::Credential;
pub use error::CryptoError;
pub use issuer::{IssueSignature, Issuer, ProofS};
pub use keys::{PrivateKey, PublicKey};
pub use proofs::{
    DisclosureProofBuilder, Proof, ProofBuilder, ProofD, ProofList, ProofP, ProofU,
    ProofUBuilder,
};
pub use signature::ClSignature;
