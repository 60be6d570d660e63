//! # Log Entry Types
//!
//! The two kinds of entry in a credential type's revocation log:
//! accumulator records (distributed to wallets and verifiers) and issuance
//! records (private to the issuer, linking a revocation key to the prime
//! it can later remove).

use chrono::{DateTime, Utc};
use num_bigint_dig::BigUint;
use serde::{Deserialize, Serialize};

use credo_crypto::bignum;
use credo_crypto::RevocationRecord;

/// Issuer-private record of one issued revocable credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceRecord {
    /// The issuer-chosen revocation key.
    pub key: String,
    /// The prime signed into the credential as its non-revocation
    /// attribute.
    #[serde(with = "bignum::dec")]
    pub e: BigUint,
    /// When the credential was issued.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued: DateTime<Utc>,
    /// Credential validity end.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub valid_until: DateTime<Utc>,
    /// Set once the credential has been revoked.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_seconds_option"
    )]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// One frame of the on-disk log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// An accumulator update.
    Accumulator(RevocationRecord),
    /// An issuance record.
    Issuance(IssuanceRecord),
}
