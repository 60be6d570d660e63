//! # Scheme Descriptions
//!
//! Static metadata about schemes, issuers and credential types, as parsed
//! from scheme material at startup. These carry no key material — the
//! registry pairing descriptions with issuer keys lives in the server.

use serde::{Deserialize, Serialize};

use crate::identifier::{CredentialTypeId, IssuerId, SchemeId};

/// A scheme manager: a trust domain declaring issuers and credential types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeInfo {
    /// The scheme identifier.
    pub id: SchemeId,
    /// Whether wallets in this scheme co-sign with a keyshare server.
    #[serde(default)]
    pub distributed: bool,
}

/// An issuer within a scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerInfo {
    /// The issuer identifier.
    pub id: IssuerId,
}

/// A credential type: its attribute layout and revocation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialTypeInfo {
    /// The credential type identifier.
    pub id: CredentialTypeId,
    /// Ordered attribute names; this order fixes the attribute slots in
    /// signatures and proofs.
    pub attributes: Vec<String>,
    /// Whether credentials of this type carry a non-revocation attribute.
    #[serde(default)]
    pub supports_revocation: bool,
}

impl CredentialTypeInfo {
    /// Slot index of a named attribute: slot 0 is the wallet secret and
    /// slot 1 the metadata attribute, so named attributes start at 2.
    pub fn attribute_slot(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a == name).map(|i| i + 2)
    }

    /// Attribute name for a slot, inverse of [`Self::attribute_slot`].
    pub fn attribute_name(&self, slot: usize) -> Option<&str> {
        slot.checked_sub(2)
            .and_then(|i| self.attributes.get(i))
            .map(String::as_str)
    }

    /// Total signed slots: secret, metadata, named attributes, plus the
    /// non-revocation attribute when supported.
    pub fn slot_count(&self) -> usize {
        2 + self.attributes.len() + usize::from(self.supports_revocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_card() -> CredentialTypeInfo {
        CredentialTypeInfo {
            id: CredentialTypeId::new("irma-demo.RU.studentCard").unwrap(),
            attributes: vec![
                "university".to_string(),
                "studentCardNumber".to_string(),
                "studentID".to_string(),
                "level".to_string(),
            ],
            supports_revocation: false,
        }
    }

    #[test]
    fn attribute_slots_start_after_metadata() {
        let info = student_card();
        assert_eq!(info.attribute_slot("university"), Some(2));
        assert_eq!(info.attribute_slot("level"), Some(5));
        assert_eq!(info.attribute_slot("nope"), None);
    }

    #[test]
    fn attribute_name_inverts_slot() {
        let info = student_card();
        assert_eq!(info.attribute_name(2), Some("university"));
        assert_eq!(info.attribute_name(5), Some("level"));
        assert_eq!(info.attribute_name(1), None);
        assert_eq!(info.attribute_name(6), None);
    }

    #[test]
    fn slot_count_includes_revocation() {
        let mut info = student_card();
        assert_eq!(info.slot_count(), 6);
        info.supports_revocation = true;
        assert_eq!(info.slot_count(), 7);
    }
}
