//! # Protocol Version Lattice
//!
//! The wallet protocol is versioned `major.minor`. The server supports a
//! closed interval of versions and negotiates the highest version both
//! sides speak. Versions below 2.5 predate the con-dis-con disclosure
//! grammar and require the legacy request rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a `major.minor` protocol version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed protocol version {0:?}")]
pub struct VersionParseError(String);

/// A `major.minor` protocol version, totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    /// Major version component.
    pub major: u8,
    /// Minor version component.
    pub minor: u8,
}

impl ProtocolVersion {
    /// Construct from components.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether this version is strictly below `major.minor`.
    pub fn below(&self, major: u8, minor: u8) -> bool {
        *self < Self::new(major, minor)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ProtocolVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| VersionParseError(s.to_string()))?;
        let major = major
            .parse()
            .map_err(|_| VersionParseError(s.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| VersionParseError(s.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Negotiate a protocol version between the server window
/// `[server_min, server_max]` and the client window `[client_min, client_max]`.
///
/// The negotiated version is `min(server_max, client_max)`; negotiation
/// fails when that falls below either side's minimum.
pub fn negotiate(
    server_min: ProtocolVersion,
    server_max: ProtocolVersion,
    client_min: ProtocolVersion,
    client_max: ProtocolVersion,
) -> Option<ProtocolVersion> {
    let negotiated = server_max.min(client_max);
    if negotiated < server_min.max(client_min) {
        return None;
    }
    Some(negotiated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let v: ProtocolVersion = "2.5".parse().unwrap();
        assert_eq!(v, ProtocolVersion::new(2, 5));
        assert_eq!(v.to_string(), "2.5");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<ProtocolVersion>().is_err());
        assert!("2".parse::<ProtocolVersion>().is_err());
        assert!("2.x".parse::<ProtocolVersion>().is_err());
        assert!("a.5".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn ordering() {
        assert!(ProtocolVersion::new(2, 4) < ProtocolVersion::new(2, 5));
        assert!(ProtocolVersion::new(2, 9) < ProtocolVersion::new(3, 0));
        assert!(ProtocolVersion::new(2, 5).below(2, 6));
        assert!(!ProtocolVersion::new(2, 5).below(2, 5));
    }

    #[test]
    fn negotiate_picks_highest_common() {
        let v = negotiate(
            ProtocolVersion::new(2, 4),
            ProtocolVersion::new(2, 7),
            ProtocolVersion::new(2, 5),
            ProtocolVersion::new(2, 6),
        );
        assert_eq!(v, Some(ProtocolVersion::new(2, 6)));
    }

    #[test]
    fn negotiate_clamps_to_server_max() {
        let v = negotiate(
            ProtocolVersion::new(2, 4),
            ProtocolVersion::new(2, 7),
            ProtocolVersion::new(2, 5),
            ProtocolVersion::new(3, 1),
        );
        assert_eq!(v, Some(ProtocolVersion::new(2, 7)));
    }

    #[test]
    fn negotiate_fails_on_disjoint_windows() {
        let v = negotiate(
            ProtocolVersion::new(2, 6),
            ProtocolVersion::new(2, 7),
            ProtocolVersion::new(2, 3),
            ProtocolVersion::new(2, 5),
        );
        assert_eq!(v, None);
    }

    #[test]
    fn serde_as_string() {
        let v = ProtocolVersion::new(2, 5);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"2.5\"");
        let back: ProtocolVersion = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(back, v);
    }
}
