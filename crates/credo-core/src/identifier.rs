//! # Domain Identifier Newtypes
//!
//! Dotted identifiers with fixed arities: scheme (`S`), issuer (`S.I`),
//! credential type (`S.I.C`) and attribute type (`S.I.C.A`). All are
//! value types: cheap to clone, hashable, and totally ordered by their
//! dotted string form.
//!
//! ## Validation
//!
//! Construction goes through `FromStr`/`new` which enforce the arity and
//! reject empty segments. The inner strings are private — a parsed
//! identifier is always well-formed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error raised when an identifier string does not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Wrong number of dotted segments, or an empty segment.
    #[error("malformed identifier {input:?}: expected {expected} dotted segments")]
    MalformedIdentifier {
        /// The offending input string.
        input: String,
        /// The arity the target type requires.
        expected: usize,
    },
}

fn split_checked(s: &str, arity: usize) -> Result<Vec<&str>, IdentifierError> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != arity || parts.iter().any(|p| p.is_empty()) {
        return Err(IdentifierError::MalformedIdentifier {
            input: s.to_string(),
            expected: arity,
        });
    }
    Ok(parts)
}

macro_rules! dotted_identifier {
    ($(#[$doc:meta])* $name:ident, $arity:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Parse from the dotted string form, validating the arity.
            pub fn new(s: impl AsRef<str>) -> Result<Self, IdentifierError> {
                s.as_ref().parse()
            }

            /// The full dotted string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The final segment (the name within its parent namespace).
            pub fn name(&self) -> &str {
                self.0.rsplit('.').next().expect("validated at construction")
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                split_checked(s, $arity)?;
                Ok(Self(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

dotted_identifier!(
    /// A scheme manager: the root trust domain, e.g. `irma-demo`.
    SchemeId,
    1
);
dotted_identifier!(
    /// An issuer within a scheme, e.g. `irma-demo.RU`.
    IssuerId,
    2
);
dotted_identifier!(
    /// A credential type within an issuer, e.g. `irma-demo.RU.studentCard`.
    CredentialTypeId,
    3
);
dotted_identifier!(
    /// An attribute type within a credential type,
    /// e.g. `irma-demo.RU.studentCard.studentID`.
    AttributeTypeId,
    4
);

impl IssuerId {
    /// The scheme this issuer belongs to.
    pub fn scheme(&self) -> SchemeId {
        let (scheme, _) = self.0.split_once('.').expect("validated at construction");
        SchemeId(scheme.to_string())
    }
}

impl CredentialTypeId {
    /// The issuer of this credential type.
    pub fn issuer(&self) -> IssuerId {
        let idx = self.0.rfind('.').expect("validated at construction");
        IssuerId(self.0[..idx].to_string())
    }

    /// The scheme this credential type belongs to.
    pub fn scheme(&self) -> SchemeId {
        self.issuer().scheme()
    }
}

impl AttributeTypeId {
    /// The credential type this attribute belongs to.
    pub fn credential_type(&self) -> CredentialTypeId {
        let idx = self.0.rfind('.').expect("validated at construction");
        CredentialTypeId(self.0[..idx].to_string())
    }

    /// The issuer of this attribute's credential type.
    pub fn issuer(&self) -> IssuerId {
        self.credential_type().issuer()
    }
}
