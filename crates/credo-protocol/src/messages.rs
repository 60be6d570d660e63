//! # Wallet Messages
//!
//! The proof-carrying messages wallets post back to the server: a
//! [`Disclosure`] for disclosure sessions, a [`SignedMessage`] for
//! signature sessions (a disclosure bound to a message digest), and an
//! [`IssueCommitmentMessage`] for issuance.

use std::collections::BTreeMap;

use num_bigint_dig::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use credo_core::SchemeId;
use credo_crypto::bignum;
use credo_crypto::{IssueSignature, ProofList, ProofP};

/// Position of one disclosed attribute: which proof, which slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeIndex {
    /// Index into the proof list.
    #[serde(rename = "cred")]
    pub cred: usize,
    /// Attribute slot within that credential.
    #[serde(rename = "attr")]
    pub attr: usize,
}

/// A wallet's disclosure: proofs plus the mapping from the request's
/// disjunctions to the attributes satisfying them.
///
/// `indices[d]` lists the disclosed attributes chosen for disjunction `d`;
/// an empty list means the wallet declined an optional disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disclosure {
    /// The proofs, disclosure proofs first.
    pub proofs: ProofList,
    /// Per-disjunction choices.
    #[serde(default)]
    pub indices: Vec<Vec<AttributeIndex>>,
}

/// A disclosure bound to a message: the wire form of an attribute-based
/// signature. Verifiable standalone, detached from any session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedMessage {
    /// The disclosure proofs.
    #[serde(flatten)]
    pub disclosure: Disclosure,
    /// The session nonce the signature was created against.
    #[serde(with = "bignum::dec")]
    pub nonce: BigUint,
    /// The proof context.
    #[serde(with = "bignum::dec")]
    pub context: BigUint,
    /// The signed message.
    pub message: String,
    /// Unix timestamp of signature creation.
    #[serde(default)]
    pub timestamp: i64,
}

impl SignedMessage {
    /// The nonce the proofs are actually bound to:
    /// `SHA-256(nonce ‖ SHA-256(message))`, so the signature commits to the
    /// message content.
    pub fn effective_nonce(nonce: &BigUint, message: &str) -> BigUint {
        let msg_digest = Sha256::digest(message.as_bytes());
        let mut hasher = Sha256::new();
        hasher.update(nonce.to_bytes_be());
        hasher.update(msg_digest);
        BigUint::from_bytes_be(&hasher.finalize())
    }
}

/// The wallet's issuance message: disclosure proofs (if any) followed by
/// one commitment proof per credential being issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCommitmentMessage {
    /// Combined proofs with their disclosure choices.
    #[serde(flatten)]
    pub combined: Disclosure,
    /// The wallet's second nonce, binding the issuer's correctness proof.
    #[serde(rename = "n_2", with = "bignum::dec")]
    pub nonce2: BigUint,
    /// Keyshare contributions per distributed scheme.
    #[serde(rename = "proofPs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub proof_ps: BTreeMap<SchemeId, ProofP>,
}

/// The server's response for one issued credential.
pub type IssueSignatureMessage = IssueSignature;

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn effective_nonce_commits_to_message() {
        let nonce = BigUint::from(123456u32);
        let a = SignedMessage::effective_nonce(&nonce, "message");
        let b = SignedMessage::effective_nonce(&nonce, "other message");
        assert_ne!(a, b);
        assert_eq!(a, SignedMessage::effective_nonce(&nonce, "message"));
    }

    #[test]
    fn effective_nonce_commits_to_nonce() {
        let a = SignedMessage::effective_nonce(&BigUint::from(1u32), "message");
        let b = SignedMessage::effective_nonce(&BigUint::from(2u32), "message");
        assert_ne!(a, b);
    }

    #[test]
    fn disclosure_wire_shape() {
        let disclosure = Disclosure {
            proofs: ProofList::default(),
            indices: vec![vec![AttributeIndex { cred: 0, attr: 2 }], vec![]],
        };
        let json = serde_json::to_value(&disclosure).unwrap();
        assert_eq!(json["indices"][0][0]["cred"], 0);
        assert_eq!(json["indices"][0][0]["attr"], 2);
        let back: Disclosure = serde_json::from_value(json).unwrap();
        assert_eq!(back, disclosure);
    }

    #[test]
    fn signed_message_roundtrip() {
        let msg = SignedMessage {
            disclosure: Disclosure {
                proofs: ProofList::default(),
                indices: vec![],
            },
            nonce: BigUint::from(42u32),
            context: BigUint::zero(),
            message: "I agree".to_string(),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: SignedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn commitment_message_roundtrip() {
        let msg = IssueCommitmentMessage {
            combined: Disclosure {
                proofs: ProofList::default(),
                indices: vec![],
            },
            nonce2: BigUint::from(7u32),
            proof_ps: BTreeMap::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["n_2"], "7");
        let back: IssueCommitmentMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
