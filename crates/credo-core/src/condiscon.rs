//! # Con-Dis-Con Disclosure Grammar
//!
//! A disclosure specification is a conjunction of disjunctions of
//! conjunctions of attribute requests: the wallet must satisfy every outer
//! conjunct by choosing exactly one inner disjunct and revealing every
//! attribute in it. An empty inner conjunct means "optionally decline".
//!
//! Disclosure and signature sessions must contain at least one disjunction
//! without an empty conjunct; issuance sessions may be all-optional.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifier::AttributeTypeId;
use crate::translated::TranslatedString;

/// Error raised when a con-dis-con does not satisfy the grammar rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CondisconError {
    /// Every disjunction contains an empty conjunct, but the session kind
    /// requires at least one mandatory disjunction.
    #[error("all disjunctions are optional; at least one must be mandatory")]
    AllOptional,
    /// An empty conjunct appears in a position other than the first of its
    /// disjunction.
    #[error("empty conjunct must be the first member of its disjunction")]
    MisplacedEmptyCon,
}

/// A single requested attribute, optionally constrained to a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRequest {
    /// The attribute being requested.
    #[serde(rename = "type")]
    pub attr_type: AttributeTypeId,
    /// When present, the disclosed value must equal this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl AttributeRequest {
    /// Request `attr_type` with any value.
    pub fn new(attr_type: AttributeTypeId) -> Self {
        Self {
            attr_type,
            value: None,
        }
    }

    /// Whether a disclosed value satisfies this request.
    pub fn matches(&self, value: &str) -> bool {
        match &self.value {
            None => true,
            Some(required) => required == value,
        }
    }
}

/// An inner conjunction: all attributes must be revealed together.
/// Empty means the wallet may decline the containing disjunction.
pub type AttributeCon = Vec<AttributeRequest>;

/// A disjunction of conjunctions: the wallet picks exactly one.
pub type AttributeDisCon = Vec<AttributeCon>;

/// The outer conjunction of disjunctions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeConDisCon(pub Vec<AttributeDisCon>);

impl AttributeConDisCon {
    /// Whether a disjunction is optional (contains an empty conjunct).
    fn is_optional(discon: &AttributeDisCon) -> bool {
        discon.iter().any(|con| con.is_empty())
    }

    /// Validate the grammar rules.
    ///
    /// `allow_all_optional` is true for issuance sessions, where a request
    /// consisting entirely of declinable disjunctions is permitted.
    pub fn validate(&self, allow_all_optional: bool) -> Result<(), CondisconError> {
        for discon in &self.0 {
            for (i, con) in discon.iter().enumerate() {
                if con.is_empty() && i != 0 {
                    return Err(CondisconError::MisplacedEmptyCon);
                }
            }
        }
        if !allow_all_optional
            && !self.0.is_empty()
            && self.0.iter().all(Self::is_optional)
        {
            return Err(CondisconError::AllOptional);
        }
        Ok(())
    }

    /// Iterate over all attribute types mentioned anywhere in the grammar.
    pub fn attribute_types(&self) -> impl Iterator<Item = &AttributeTypeId> {
        self.0
            .iter()
            .flatten()
            .flatten()
            .map(|req| &req.attr_type)
    }

    /// Number of outer conjuncts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the specification requests nothing at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Verification status of a single disclosed attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeProofStatus {
    /// Attribute was requested and disclosed with a satisfying value.
    Present,
    /// Attribute was disclosed without having been requested.
    Extra,
    /// Attribute is absent from the credential (null value).
    Null,
}

/// A single disclosed attribute as reported in the session result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedAttribute {
    /// The raw attribute string, absent for null attributes.
    #[serde(rename = "rawvalue")]
    pub raw_value: Option<String>,
    /// The per-language rendering of the value.
    pub value: TranslatedString,
    /// Which attribute this is.
    #[serde(rename = "id")]
    pub identifier: AttributeTypeId,
    /// How the attribute relates to the request.
    pub status: AttributeProofStatus,
    /// Unix timestamp of the credential's issuance.
    #[serde(rename = "issuancetime")]
    pub issuance_time: i64,
}
