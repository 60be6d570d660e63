//! # Protocol Error Taxonomy
//!
//! The wire-facing error kinds and the JSON error envelope returned to
//! wallets and requestors. The envelope shape and kind names are part of
//! the wire contract with existing wallets; the HTTP status per kind is
//! fixed here so the routing layer stays free of error policy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable protocol error kinds.
///
/// These map 1:1 onto the `error` field of the JSON envelope. Storage-layer
/// failures without a finer category use `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Message received in a session state that does not accept it.
    /// Never transitions state; safe to retry.
    UnexpectedRequest,
    /// The message body could not be interpreted.
    MalformedInput,
    /// The session request itself is invalid (e.g. an all-optional
    /// disclosure in a disclosure session).
    MalformedRequest,
    /// A proof references an issuer public key the server does not hold.
    UnknownPublicKey,
    /// A proof from a distributed scheme lacks its keyshare contribution.
    KeyshareProofMissing,
    /// Disclosed attributes were expired at verification time.
    AttributesExpired,
    /// Proof verification failed cryptographically or against the request.
    InvalidProofs,
    /// Producing an issued signature failed.
    IssuanceFailed,
    /// Version negotiation failed.
    ProtocolVersion,
    /// The operation is not supported by this server.
    InvalidRequest,
    /// Uncategorised failure.
    Unknown,
}

impl ErrorKind {
    /// The HTTP status code this kind is delivered with.
    pub fn status(&self) -> u16 {
        match self {
            Self::UnexpectedRequest => 403,
            Self::MalformedInput | Self::MalformedRequest => 400,
            Self::UnknownPublicKey
            | Self::KeyshareProofMissing
            | Self::AttributesExpired
            | Self::InvalidProofs
            | Self::IssuanceFailed => 400,
            Self::ProtocolVersion => 400,
            Self::InvalidRequest => 400,
            Self::Unknown => 500,
        }
    }

    /// A fixed human-readable description of the kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UnexpectedRequest => "Unexpected request in this state",
            Self::MalformedInput => "Input could not be parsed",
            Self::MalformedRequest => "Malformed session request",
            Self::UnknownPublicKey => "Attributes were signed by unknown public key",
            Self::KeyshareProofMissing => {
                "Keyshare server did not supply proof of knowledge of its part of the secret key"
            }
            Self::AttributesExpired => "Disclosed attributes were expired",
            Self::InvalidProofs => "Invalid secure protocol message",
            Self::IssuanceFailed => "Failed to create credential(s)",
            Self::ProtocolVersion => "Protocol version negotiation failed",
            Self::InvalidRequest => "Invalid request",
            Self::Unknown => "Unknown internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The JSON error envelope delivered to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{error}: {description}")]
pub struct RemoteError {
    /// HTTP status the envelope is delivered with.
    pub status: u16,
    /// The machine-readable kind.
    pub error: ErrorKind,
    /// Fixed description of the kind.
    pub description: String,
    /// Optional context-specific message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Optional stack trace; populated only in debug deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,
}

impl RemoteError {
    /// Build an envelope for `kind` with an optional context message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: kind.status(),
            error: kind,
            description: kind.description().to_string(),
            message: if message.is_empty() {
                None
            } else {
                Some(message)
            },
            stacktrace: None,
        }
    }

    /// The kind carried by this envelope.
    pub fn kind(&self) -> ErrorKind {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_statuses() {
        assert_eq!(ErrorKind::UnexpectedRequest.status(), 403);
        assert_eq!(ErrorKind::MalformedInput.status(), 400);
        assert_eq!(ErrorKind::Unknown.status(), 500);
    }

    #[test]
    fn envelope_shape() {
        let err = RemoteError::new(ErrorKind::InvalidProofs, "bad proof");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "InvalidProofs");
        assert_eq!(json["status"], 400);
        assert_eq!(json["message"], "bad proof");
        assert!(json.get("stacktrace").is_none());
    }

    #[test]
    fn empty_message_omitted() {
        let err = RemoteError::new(ErrorKind::ProtocolVersion, "");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("message").is_none());
    }

    #[test]
    fn envelope_roundtrip() {
        let err = RemoteError::new(ErrorKind::KeyshareProofMissing, "scheme test");
        let json = serde_json::to_string(&err).unwrap();
        let back: RemoteError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
        assert_eq!(back.kind(), ErrorKind::KeyshareProofMissing);
    }
}
