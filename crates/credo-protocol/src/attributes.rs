//! # Attribute Integer Encoding
//!
//! Credential attributes are signed as integers. A string attribute is its
//! UTF-8 bytes as a big-endian integer, shifted left one bit with the low
//! bit set — the presence flag distinguishing an empty string from an
//! absent attribute (which encodes as zero).
//!
//! Slot 1 of every credential is the metadata attribute: a fixed-width
//! structure carrying the encoding version, signing and expiry dates, the
//! issuer key counter, and a hash identifying the credential type. The
//! metadata attribute is always disclosed; verifiers use it to find the
//! issuer public key and to check expiry.

use chrono::{DateTime, TimeZone, Utc};
use num_bigint_dig::BigUint;
use num_integer::Integer;
use num_traits::Zero;
use sha2::{Digest, Sha256};
use thiserror::Error;

use credo_core::CredentialTypeId;

/// The current metadata encoding version byte.
pub const METADATA_VERSION: u8 = 0x03;

const METADATA_BYTES: usize = 1 + 4 + 8 + 8 + 16;
const SECONDS_PER_DAY: i64 = 86_400;

/// Error decoding an attribute or metadata integer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// The metadata integer is too wide or carries an unknown version.
    #[error("malformed metadata attribute: {0}")]
    MalformedMetadata(String),
    /// The attribute bytes are not valid UTF-8.
    #[error("attribute is not valid UTF-8")]
    NotUtf8,
}

/// Encode an attribute value. `None` (absent) encodes as zero; a present
/// string is shifted left with the presence bit set.
pub fn encode_attribute(value: Option<&str>) -> BigUint {
    match value {
        None => BigUint::zero(),
        Some(s) => {
            let raw = BigUint::from_bytes_be(s.as_bytes());
            (raw << 1usize) + BigUint::from(1u32)
        }
    }
}

/// Decode an attribute integer back to its optional string value.
pub fn decode_attribute(value: &BigUint) -> Result<Option<String>, AttributeError> {
    if value.is_zero() {
        return Ok(None);
    }
    if value.is_odd() {
        let raw: BigUint = value >> 1usize;
        let bytes = raw.to_bytes_be();
        // An empty string shifts to exactly 1, whose raw part is zero.
        if raw.is_zero() {
            return Ok(Some(String::new()));
        }
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| AttributeError::NotUtf8)
    } else {
        // Presence bit unset on a nonzero value: old-format attribute,
        // taken verbatim.
        String::from_utf8(value.to_bytes_be())
            .map(Some)
            .map_err(|_| AttributeError::NotUtf8)
    }
}

/// The structured metadata attribute at slot 1 of every credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAttribute {
    /// Encoding version byte.
    pub version: u8,
    /// Issuer key rollover counter.
    pub key_counter: u32,
    /// Signing date, in days since the Unix epoch.
    pub signing_date: u64,
    /// Expiry date, in days since the Unix epoch.
    pub expiry: u64,
    /// Truncated SHA-256 of the credential type identifier.
    pub credtype_hash: [u8; 16],
}

impl MetadataAttribute {
    /// Build metadata for a credential signed now and valid until `expiry`.
    pub fn new(
        credtype: &CredentialTypeId,
        key_counter: u32,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            version: METADATA_VERSION,
            key_counter,
            signing_date: (now.timestamp() / SECONDS_PER_DAY).max(0) as u64,
            expiry: (expiry.timestamp() / SECONDS_PER_DAY).max(0) as u64,
            credtype_hash: credtype_hash(credtype),
        }
    }

    /// Serialize to the signed attribute integer.
    pub fn to_int(&self) -> BigUint {
        let mut bytes = Vec::with_capacity(METADATA_BYTES);
        bytes.push(self.version);
        bytes.extend_from_slice(&self.key_counter.to_be_bytes());
        bytes.extend_from_slice(&self.signing_date.to_be_bytes());
        bytes.extend_from_slice(&self.expiry.to_be_bytes());
        bytes.extend_from_slice(&self.credtype_hash);
        BigUint::from_bytes_be(&bytes)
    }

    /// Parse back from a signed attribute integer.
    pub fn from_int(value: &BigUint) -> Result<Self, AttributeError> {
        let raw = value.to_bytes_be();
        if raw.len() > METADATA_BYTES {
            return Err(AttributeError::MalformedMetadata(format!(
                "{} bytes, expected at most {METADATA_BYTES}",
                raw.len()
            )));
        }
        let mut bytes = [0u8; METADATA_BYTES];
        bytes[METADATA_BYTES - raw.len()..].copy_from_slice(&raw);

        let version = bytes[0];
        if version != METADATA_VERSION {
            return Err(AttributeError::MalformedMetadata(format!(
                "unknown version byte {version:#04x}"
            )));
        }
        let key_counter = u32::from_be_bytes(bytes[1..5].try_into().expect("fixed width"));
        let signing_date = u64::from_be_bytes(bytes[5..13].try_into().expect("fixed width"));
        let expiry = u64::from_be_bytes(bytes[13..21].try_into().expect("fixed width"));
        let mut credtype_hash = [0u8; 16];
        credtype_hash.copy_from_slice(&bytes[21..37]);

        Ok(Self {
            version,
            key_counter,
            signing_date,
            expiry,
            credtype_hash,
        })
    }

    /// Whether the credential is expired at `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        (self.expiry as i64) * SECONDS_PER_DAY <= now.timestamp()
    }

    /// Signing date as a timestamp (midnight of the signing day).
    pub fn issuance_time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt((self.signing_date as i64) * SECONDS_PER_DAY, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Expiry date as a timestamp (midnight of the expiry day).
    pub fn expiry_time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt((self.expiry as i64) * SECONDS_PER_DAY, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Truncated SHA-256 identifying a credential type inside metadata.
pub fn credtype_hash(id: &CredentialTypeId) -> [u8; 16] {
    let digest = Sha256::digest(id.as_str().as_bytes());
    let mut hash = [0u8; 16];
    hash.copy_from_slice(&digest[..16]);
    hash
}
