//! # Proof Engine
//!
//! Verification of disclosure, signature and issuance-commitment proofs
//! against a session request: cryptographic validity of the shared
//! challenge, expiry of the disclosed metadata, non-revocation witnesses
//! against the current accumulator, and satisfaction of the con-dis-con
//! disclosure specification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_bigint_dig::BigUint;

use credo_core::{
    AttributeConDisCon, AttributeProofStatus, AttributeTypeId, CredentialTypeId,
    DisclosedAttribute, TranslatedString,
};
use credo_crypto::{Proof, ProofD, PublicKey};
use credo_protocol::attributes::{decode_attribute, MetadataAttribute};
use credo_protocol::{Disclosure, ProofStatus};
use credo_revocation::{RevocationError, RevocationRegistry};

use crate::registry::SchemeRegistry;

/// Failures that abort verification outright (as opposed to verdicts
/// reported through [`ProofStatus`]).
#[derive(Debug)]
pub(crate) enum EngineError {
    /// A proof references key material the registry does not hold.
    UnknownPublicKey(String),
    /// The message is structurally unusable.
    Malformed(String),
    /// Storage or arithmetic failure.
    Internal(String),
}

/// The engine's verdict: the disclosed matrix and the proof status.
pub(crate) struct VerificationOutcome {
    pub disclosed: Vec<Vec<DisclosedAttribute>>,
    pub status: ProofStatus,
}

impl VerificationOutcome {
    fn status_only(status: ProofStatus) -> Self {
        Self {
            disclosed: Vec::new(),
            status,
        }
    }
}

/// Parse the always-disclosed metadata attribute of a disclosure proof.
fn proof_metadata(proof: &ProofD) -> Result<MetadataAttribute, EngineError> {
    let int = proof
        .a_disclosed
        .get(&1)
        .ok_or_else(|| EngineError::Malformed("metadata attribute not disclosed".to_string()))?;
    MetadataAttribute::from_int(int).map_err(|e| EngineError::Malformed(e.to_string()))
}

/// Extract the public keys declared by the first `count` proofs, which
/// must all be disclosure proofs carrying metadata.
pub(crate) fn extract_public_keys(
    registry: &SchemeRegistry,
    disclosure: &Disclosure,
    count: usize,
) -> Result<Vec<Arc<PublicKey>>, EngineError> {
    let mut keys = Vec::with_capacity(count);
    for proof in disclosure.proofs.0.iter().take(count) {
        let Proof::D(proof) = proof else {
            return Err(EngineError::Malformed(
                "expected a disclosure proof".to_string(),
            ));
        };
        let metadata = proof_metadata(proof)?;
        let info = registry
            .credential_type_by_hash(&metadata.credtype_hash)
            .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;
        let key = registry
            .public_key(&info.id.issuer(), metadata.key_counter)
            .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;
        keys.push(key);
    }
    Ok(keys)
}

/// The credential types declared by the first `count` proofs.
pub(crate) fn extract_credential_types(
    registry: &SchemeRegistry,
    disclosure: &Disclosure,
    count: usize,
) -> Result<Vec<CredentialTypeId>, EngineError> {
    let mut types = Vec::with_capacity(count);
    for proof in disclosure.proofs.0.iter().take(count) {
        let Proof::D(proof) = proof else {
            return Err(EngineError::Malformed(
                "expected a disclosure proof".to_string(),
            ));
        };
        let metadata = proof_metadata(proof)?;
        let info = registry
            .credential_type_by_hash(&metadata.credtype_hash)
            .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;
        types.push(info.id.clone());
    }
    Ok(types)
}

/// Verify a disclosure against a request.
///
/// `pubkeys` parallels the proof list; the first `disclose_count` proofs
/// are the disclosure part matched against `disclose` (for plain
/// disclosure sessions this is all of them).
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_disclosure(
    registry: &SchemeRegistry,
    revocation: &RevocationRegistry,
    disclose: &AttributeConDisCon,
    required_nonrev: &[CredentialTypeId],
    context: &BigUint,
    nonce: &BigUint,
    disclosure: &Disclosure,
    pubkeys: &[Arc<PublicKey>],
    disclose_count: usize,
    now: DateTime<Utc>,
) -> Result<VerificationOutcome, EngineError> {
    if pubkeys.len() != disclosure.proofs.len() {
        return Err(EngineError::Malformed(format!(
            "{} proofs with {} public keys",
            disclosure.proofs.len(),
            pubkeys.len()
        )));
    }

    // 1. Cryptographic validity of the shared challenge.
    let key_refs: Vec<&PublicKey> = pubkeys.iter().map(Arc::as_ref).collect();
    if disclosure.proofs.verify(&key_refs, context, nonce).is_err() {
        return Ok(VerificationOutcome::status_only(ProofStatus::Invalid));
    }

    // 2. Per-credential checks over the disclosure part: expiry and
    //    non-revocation.
    let mut expired = false;
    for proof in disclosure.proofs.0.iter().take(disclose_count) {
        let Proof::D(proof) = proof else {
            return Err(EngineError::Malformed(
                "expected a disclosure proof".to_string(),
            ));
        };
        let metadata = proof_metadata(proof)?;
        if metadata.expired(now) {
            expired = true;
        }

        let info = registry
            .credential_type_by_hash(&metadata.credtype_hash)
            .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;
        if required_nonrev.contains(&info.id) {
            if !verify_nonrev(registry, revocation, &info.id, proof)? {
                return Ok(VerificationOutcome::status_only(ProofStatus::Invalid));
            }
        }
    }

    // 3. Satisfaction of the con-dis-con specification.
    let disclosed = match match_condiscon(registry, disclose, disclosure, disclose_count)? {
        Some(matrix) => matrix,
        None => {
            return Ok(VerificationOutcome::status_only(
                ProofStatus::MissingAttributes,
            ))
        }
    };

    Ok(VerificationOutcome {
        disclosed,
        status: if expired {
            ProofStatus::Expired
        } else {
            ProofStatus::Valid
        },
    })
}

/// Check a proof's non-revocation witness against the current accumulator
/// of `credtype`.
fn verify_nonrev(
    registry: &SchemeRegistry,
    revocation: &RevocationRegistry,
    credtype: &CredentialTypeId,
    proof: &ProofD,
) -> Result<bool, EngineError> {
    let Some(witness) = &proof.nonrev else {
        return Ok(false);
    };
    let rev_pk = registry
        .revocation_public_key(&credtype.issuer())
        .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;
    let db = revocation
        .db(credtype, rev_pk)
        .map_err(|e| EngineError::Internal(e.to_string()))?;
    let current = match db.current() {
        Ok(current) => current,
        Err(RevocationError::NotEnabled) => {
            return Err(EngineError::Internal(format!(
                "revocation required but not enabled for {credtype}"
            )))
        }
        Err(e) => return Err(EngineError::Internal(e.to_string())),
    };
    Ok(witness.verify(db.public_key(), &current))
}

/// One resolved disclosed attribute, before request matching.
struct ResolvedAttribute {
    identifier: AttributeTypeId,
    raw_value: Option<String>,
    disclosed: DisclosedAttribute,
}

/// Match the wallet's disclosure choices against the request's grammar.
/// Returns the disclosed matrix mirroring the disjunction shape, or `None`
/// when some disjunction cannot be satisfied.
fn match_condiscon(
    registry: &SchemeRegistry,
    disclose: &AttributeConDisCon,
    disclosure: &Disclosure,
    disclose_count: usize,
) -> Result<Option<Vec<Vec<DisclosedAttribute>>>, EngineError> {
    let empty: &[credo_protocol::AttributeIndex] = &[];
    let mut matrix = Vec::with_capacity(disclose.len());

    for (d, discon) in disclose.0.iter().enumerate() {
        let choices = disclosure
            .indices
            .get(d)
            .map(Vec::as_slice)
            .unwrap_or(empty);

        if choices.is_empty() {
            // Declining is only valid for disjunctions with an empty con.
            if discon.iter().any(|con| con.is_empty()) {
                matrix.push(Vec::new());
                continue;
            }
            return Ok(None);
        }

        let resolved = choices
            .iter()
            .map(|idx| resolve_attribute(registry, disclosure, disclose_count, idx))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(row) = match_discon(discon, &resolved) else {
            return Ok(None);
        };
        matrix.push(row);
    }

    Ok(Some(matrix))
}

/// Find a conjunction the resolved attributes satisfy exactly, and order
/// the row by it.
fn match_discon(
    discon: &[Vec<credo_core::AttributeRequest>],
    resolved: &[ResolvedAttribute],
) -> Option<Vec<DisclosedAttribute>> {
    'cons: for con in discon {
        if con.len() != resolved.len() {
            continue;
        }
        let mut used = vec![false; resolved.len()];
        let mut row = Vec::with_capacity(con.len());
        for request in con {
            let found = resolved.iter().enumerate().find(|(i, attr)| {
                !used[*i]
                    && attr.identifier == request.attr_type
                    && attr
                        .raw_value
                        .as_deref()
                        .is_some_and(|value| request.matches(value))
            });
            match found {
                Some((i, attr)) => {
                    used[i] = true;
                    row.push(attr.disclosed.clone());
                }
                None => continue 'cons,
            }
        }
        return Some(row);
    }
    None
}

/// Resolve one disclosure choice to its attribute identity and value.
fn resolve_attribute(
    registry: &SchemeRegistry,
    disclosure: &Disclosure,
    disclose_count: usize,
    index: &credo_protocol::AttributeIndex,
) -> Result<ResolvedAttribute, EngineError> {
    if index.cred >= disclose_count {
        return Err(EngineError::Malformed(format!(
            "disclosure index references proof {}",
            index.cred
        )));
    }
    let Proof::D(proof) = &disclosure.proofs.0[index.cred] else {
        return Err(EngineError::Malformed(
            "disclosure index references a commitment proof".to_string(),
        ));
    };
    let metadata = proof_metadata(proof)?;
    let info = registry
        .credential_type_by_hash(&metadata.credtype_hash)
        .map_err(|e| EngineError::UnknownPublicKey(e.to_string()))?;

    let value_int = proof.a_disclosed.get(&index.attr).ok_or_else(|| {
        EngineError::Malformed(format!("attribute slot {} not disclosed", index.attr))
    })?;
    let name = info.attribute_name(index.attr).ok_or_else(|| {
        EngineError::Malformed(format!("credential type has no attribute slot {}", index.attr))
    })?;
    let identifier = format!("{}.{name}", info.id)
        .parse::<AttributeTypeId>()
        .map_err(|e| EngineError::Internal(e.to_string()))?;

    let raw_value =
        decode_attribute(value_int).map_err(|e| EngineError::Malformed(e.to_string()))?;

    let disclosed = DisclosedAttribute {
        raw_value: raw_value.clone(),
        value: TranslatedString::uniform(raw_value.clone().unwrap_or_default()),
        identifier: identifier.clone(),
        status: if raw_value.is_some() {
            AttributeProofStatus::Present
        } else {
            AttributeProofStatus::Null
        },
        issuance_time: metadata.issuance_time().timestamp(),
    };

    Ok(ResolvedAttribute {
        identifier,
        raw_value,
        disclosed,
    })
}
