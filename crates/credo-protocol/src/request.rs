//! # Session Requests
//!
//! The tagged request variants a requestor submits to start a session and
//! wallets fetch on connect: disclosure, signature (disclosure bound to a
//! message), and issuance (optionally combined with a disclosure). One sum
//! type replaces a polymorphic hierarchy; operations valid for every kind
//! go through the [`BaseRequest`] view, the rest match on the variant.
//!
//! Wallets below protocol version 2.5 do not understand the con-dis-con
//! grammar; requests expressible in the older flat disjunction list can be
//! re-rendered via [`SessionRequest::legacy`].

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use num_bigint_dig::BigUint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credo_core::condiscon::CondisconError;
use credo_core::{
    AttributeConDisCon, AttributeTypeId, CredentialTypeId, CredentialTypeInfo, ProtocolVersion,
};
use credo_crypto::bignum;
use credo_crypto::RevocationRecord;

use crate::attributes::{encode_attribute, MetadataAttribute};

/// JSON-LD context of disclosure requests.
pub const LD_CONTEXT_DISCLOSURE: &str = "https://irma.app/ld/request/disclosure/v2";
/// JSON-LD context of signature requests.
pub const LD_CONTEXT_SIGNATURE: &str = "https://irma.app/ld/request/signature/v2";
/// JSON-LD context of issuance requests.
pub const LD_CONTEXT_ISSUANCE: &str = "https://irma.app/ld/request/issuance/v2";

/// Default credential validity when a request does not specify one.
const DEFAULT_VALIDITY_DAYS: i64 = 182;

/// Errors raised while validating or converting a session request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The disclosure specification violates the grammar rules.
    #[error(transparent)]
    Condiscon(#[from] CondisconError),

    /// An issuance request without credentials.
    #[error("issuance request contains no credentials")]
    NoCredentials,

    /// The request cannot be rendered in the legacy format.
    #[error("request is not expressible in the legacy format: {0}")]
    NotLegacyCompatible(String),

    /// A revocable credential type was requested without a revocation key.
    #[error("credential type {0} requires a revocation key")]
    MissingRevocationKey(CredentialTypeId),

    /// A revocation key was supplied for a type without revocation.
    #[error("credential type {0} does not support revocation")]
    UnexpectedRevocationKey(CredentialTypeId),

    /// A requested attribute name does not exist in the credential type.
    #[error("credential type {credtype} has no attribute {name:?}")]
    UnknownAttribute {
        /// The credential type being issued.
        credtype: CredentialTypeId,
        /// The offending attribute name.
        name: String,
    },
}

/// The three session kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    /// Prove a set of attribute values.
    Disclosing,
    /// Disclosure bound to a message, yielding a detached signature.
    Signing,
    /// The server signs new credentials.
    Issuing,
}

/// Outcome of verifying a wallet's proofs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    /// Proofs verify and satisfy the request.
    Valid,
    /// Proofs verify but an attribute was expired at verification time.
    Expired,
    /// Cryptographic verification failed.
    Invalid,
    /// Proofs verify but do not satisfy the disclosure specification.
    UnmatchedRequest,
    /// The wallet could not satisfy the request.
    MissingAttributes,
}

/// Fields common to every session request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseRequest {
    /// JSON-LD context identifying the request kind.
    #[serde(rename = "@context", default, skip_serializing_if = "String::is_empty")]
    pub ld_context: String,
    /// Shared Fiat–Shamir context for this session's proofs.
    #[serde(default, with = "bignum::dec")]
    pub context: BigUint,
    /// Session nonce the proofs must be bound to.
    #[serde(default, with = "bignum::dec")]
    pub nonce: BigUint,
    /// Negotiated protocol version, filled in on `GetRequest`.
    #[serde(
        rename = "protocolVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol_version: Option<ProtocolVersion>,
    /// Credential types whose non-revocation must be proved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub revocation: Vec<CredentialTypeId>,
    /// Latest revocation records per required type, attached on
    /// `GetRequest` so the wallet can update its witnesses.
    #[serde(
        rename = "revocationUpdates",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub revocation_updates: BTreeMap<CredentialTypeId, Vec<RevocationRecord>>,
}

/// Request to disclose attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRequest {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// What must be disclosed.
    #[serde(default, skip_serializing_if = "AttributeConDisCon::is_empty")]
    pub disclose: AttributeConDisCon,
}

/// Request for an attribute-based signature over a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// What must be disclosed alongside the signature.
    #[serde(default, skip_serializing_if = "AttributeConDisCon::is_empty")]
    pub disclose: AttributeConDisCon,
    /// The message being signed.
    pub message: String,
}

/// Request to issue credentials, optionally combined with a disclosure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// Attributes to disclose before issuance; may be entirely optional.
    #[serde(default, skip_serializing_if = "AttributeConDisCon::is_empty")]
    pub disclose: AttributeConDisCon,
    /// Credentials to issue, in order.
    pub credentials: Vec<CredentialRequest>,
}

/// One credential to be issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRequest {
    /// The credential type.
    #[serde(rename = "credential")]
    pub credential_type: CredentialTypeId,
    /// Attribute name to value.
    pub attributes: BTreeMap<String, String>,
    /// Validity end; a default window applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "chrono::serde::ts_seconds_option")]
    pub validity: Option<DateTime<Utc>>,
    /// Issuer key rollover counter to sign under.
    #[serde(rename = "keyCounter", default)]
    pub key_counter: u32,
    /// Issuer-chosen revocation key. Secret: stripped from the request
    /// copy wallets receive. Required iff the type supports revocation.
    #[serde(
        rename = "revocationKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub revocation_key: Option<String>,
}

impl CredentialRequest {
    /// Compute the issuer-signed attribute slots (metadata first, then the
    /// named attributes in credential-type order) and the metadata itself.
    pub fn attribute_ints(
        &self,
        info: &CredentialTypeInfo,
        now: DateTime<Utc>,
    ) -> Result<(Vec<BigUint>, MetadataAttribute), RequestError> {
        for name in self.attributes.keys() {
            if !info.attributes.iter().any(|a| a == name) {
                return Err(RequestError::UnknownAttribute {
                    credtype: self.credential_type.clone(),
                    name: name.clone(),
                });
            }
        }

        let expiry = self
            .validity
            .unwrap_or_else(|| now + Duration::days(DEFAULT_VALIDITY_DAYS));
        let metadata = MetadataAttribute::new(&self.credential_type, self.key_counter, now, expiry);

        let mut slots = Vec::with_capacity(info.attributes.len() + 1);
        slots.push(metadata.to_int());
        for name in &info.attributes {
            slots.push(encode_attribute(
                self.attributes.get(name).map(String::as_str),
            ));
        }
        Ok((slots, metadata))
    }
}

/// A session request, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionRequest {
    /// `"type": "disclosing"`
    #[serde(rename = "disclosing")]
    Disclosure(DisclosureRequest),
    /// `"type": "signing"`
    #[serde(rename = "signing")]
    Signature(SignatureRequest),
    /// `"type": "issuing"`
    #[serde(rename = "issuing")]
    Issuance(IssuanceRequest),
}

impl SessionRequest {
    /// The session kind.
    pub fn action(&self) -> SessionAction {
        match self {
            Self::Disclosure(_) => SessionAction::Disclosing,
            Self::Signature(_) => SessionAction::Signing,
            Self::Issuance(_) => SessionAction::Issuing,
        }
    }

    /// The common fields.
    pub fn base(&self) -> &BaseRequest {
        match self {
            Self::Disclosure(r) => &r.base,
            Self::Signature(r) => &r.base,
            Self::Issuance(r) => &r.base,
        }
    }

    /// The common fields, mutably.
    pub fn base_mut(&mut self) -> &mut BaseRequest {
        match self {
            Self::Disclosure(r) => &mut r.base,
            Self::Signature(r) => &mut r.base,
            Self::Issuance(r) => &mut r.base,
        }
    }

    /// The disclosure specification.
    pub fn disclose(&self) -> &AttributeConDisCon {
        match self {
            Self::Disclosure(r) => &r.disclose,
            Self::Signature(r) => &r.disclose,
            Self::Issuance(r) => &r.disclose,
        }
    }

    /// Structural validation: grammar rules per session kind, and at least
    /// one credential for issuance.
    pub fn validate(&self) -> Result<(), RequestError> {
        let allow_all_optional = matches!(self, Self::Issuance(_));
        self.disclose().validate(allow_all_optional)?;
        if let Self::Issuance(r) = self {
            if r.credentials.is_empty() {
                return Err(RequestError::NoCredentials);
            }
        }
        Ok(())
    }

    /// Every attribute type mentioned by the disclosure specification.
    pub fn disclosed_attribute_types(&self) -> impl Iterator<Item = &AttributeTypeId> {
        self.disclose().attribute_types()
    }

    /// Re-render in the pre-con-dis-con format, when expressible: each
    /// disjunction must consist of single-attribute conjunctions without
    /// value constraints or declinable branches.
    pub fn legacy(&self) -> Result<LegacySessionRequest, RequestError> {
        let content = self
            .disclose()
            .0
            .iter()
            .map(|discon| {
                let mut attributes = Vec::with_capacity(discon.len());
                for con in discon {
                    match con.as_slice() {
                        [] => {
                            return Err(RequestError::NotLegacyCompatible(
                                "optional disjunctions are not expressible".to_string(),
                            ))
                        }
                        [single] if single.value.is_none() => {
                            attributes.push(single.attr_type.clone())
                        }
                        [single] => {
                            return Err(RequestError::NotLegacyCompatible(format!(
                                "value constraint on {} is not expressible",
                                single.attr_type
                            )))
                        }
                        _ => {
                            return Err(RequestError::NotLegacyCompatible(
                                "multi-attribute conjunctions are not expressible".to_string(),
                            ))
                        }
                    }
                }
                Ok(LegacyDisjunction {
                    label: None,
                    attributes,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match self {
            Self::Disclosure(r) => LegacySessionRequest::Disclosure(LegacyDisclosureBody {
                base: r.base.clone(),
                content,
            }),
            Self::Signature(r) => LegacySessionRequest::Signature(LegacySignatureBody {
                base: r.base.clone(),
                content,
                message: r.message.clone(),
            }),
            Self::Issuance(r) => LegacySessionRequest::Issuance(LegacyIssuanceBody {
                base: r.base.clone(),
                disclose: content,
                credentials: r.credentials.clone(),
            }),
        })
    }

    /// A copy safe to hand to wallets: issuance revocation keys cleared.
    pub fn sanitized(&self) -> SessionRequest {
        let mut copy = self.clone();
        if let Self::Issuance(r) = &mut copy {
            for cred in &mut r.credentials {
                cred.revocation_key = None;
            }
        }
        copy
    }
}

// ---------------------------------------------------------------------------
// Legacy rendering
// ---------------------------------------------------------------------------

/// A disjunction in the legacy request format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDisjunction {
    /// Optional display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The attribute alternatives.
    pub attributes: Vec<AttributeTypeId>,
}

/// Legacy disclosure body: the flat disjunction list under `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyDisclosureBody {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// The flat disjunction list.
    pub content: Vec<LegacyDisjunction>,
}

/// Legacy signature body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacySignatureBody {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// The flat disjunction list.
    pub content: Vec<LegacyDisjunction>,
    /// The message being signed.
    pub message: String,
}

/// Legacy issuance body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyIssuanceBody {
    /// Common request fields.
    #[serde(flatten)]
    pub base: BaseRequest,
    /// The flat disjunction list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disclose: Vec<LegacyDisjunction>,
    /// Credentials to issue.
    pub credentials: Vec<CredentialRequest>,
}

/// A session request in the legacy wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LegacySessionRequest {
    /// `"type": "disclosing"`
    #[serde(rename = "disclosing")]
    Disclosure(LegacyDisclosureBody),
    /// `"type": "signing"`
    #[serde(rename = "signing")]
    Signature(LegacySignatureBody),
    /// `"type": "issuing"`
    #[serde(rename = "issuing")]
    Issuance(LegacyIssuanceBody),
}

impl LegacySessionRequest {
    /// The common fields, mutably.
    pub fn base_mut(&mut self) -> &mut BaseRequest {
        match self {
            Self::Disclosure(r) => &mut r.base,
            Self::Signature(r) => &mut r.base,
            Self::Issuance(r) => &mut r.base,
        }
    }
}

/// What `GetRequest` returns: the current format, or the legacy rendering
/// for wallets below protocol version 2.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireSessionRequest {
    /// The con-dis-con format.
    Current(SessionRequest),
    /// The pre-2.5 format.
    Legacy(LegacySessionRequest),
}
