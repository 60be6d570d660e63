//! # credo-protocol — Wallet Protocol Wire Types
//!
//! The messages exchanged between wallets and the credo server: session
//! requests (disclosure, signature, issuance) with their legacy rendering
//! and issuance sanitisation, the attribute integer encoding shared by
//! issuer and verifier, and the proof-carrying wallet messages.
//!
//! The wire shapes here are a compatibility contract with deployed
//! wallets; field names and tag values must not drift.

pub mod attributes;
pub mod messages;
pub mod request;

pub use attributes::{decode_attribute, encode_attribute, MetadataAttribute};
pub use messages::{
    AttributeIndex, Disclosure, IssueCommitmentMessage, IssueSignatureMessage, SignedMessage,
};
pub use request::{
    BaseRequest, CredentialRequest, DisclosureRequest, IssuanceRequest, LegacyDisjunction,
    LegacySessionRequest, ProofStatus, RequestError, SessionAction, SessionRequest,
    SignatureRequest, WireSessionRequest,
};
