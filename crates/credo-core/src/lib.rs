//! # credo-core — Foundational Types for the Credo Server
//!
//! This crate is the bedrock of the credo workspace. It defines the
//! type-system primitives every other crate builds on: validated
//! identifier newtypes, the protocol version lattice, the wire error
//! taxonomy, and the con-dis-con disclosure grammar.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain identifiers.** `SchemeId`, `IssuerId`,
//!    `CredentialTypeId`, `AttributeTypeId` — all newtypes with validated
//!    constructors. No bare strings for identifiers.
//!
//! 2. **Fixed arity, enforced at parse time.** An issuer identifier has
//!    exactly two dotted segments, a credential type three, an attribute
//!    type four. Wrong arity fails construction, not some later lookup.
//!
//! 3. **One error taxonomy.** The eleven protocol error kinds are a single
//!    enum; every remote-facing failure in the workspace maps onto it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `credo-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod condiscon;
pub mod error;
pub mod identifier;
pub mod scheme;
pub mod translated;
pub mod version;

pub use condiscon::{
    AttributeCon, AttributeConDisCon, AttributeDisCon, AttributeProofStatus, AttributeRequest,
    CondisconError, DisclosedAttribute,
};
pub use error::{ErrorKind, RemoteError};
pub use identifier::{
    AttributeTypeId, CredentialTypeId, IdentifierError, IssuerId, SchemeId,
};
pub use scheme::{CredentialTypeInfo, IssuerInfo, SchemeInfo};
pub use translated::TranslatedString;
pub use version::ProtocolVersion;
