//! # Server Configuration
//!
//! One explicit `Configuration` value threaded through every component —
//! no ambient singletons. Holds the scheme registry, revocation storage
//! root, protocol window, and session lifecycle parameters.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::Duration;

use credo_core::{CredentialTypeId, ProtocolVersion};

use crate::registry::SchemeRegistry;

/// Server configuration.
pub struct Configuration {
    /// Public base URL sessions are reachable at, e.g.
    /// `http://localhost:48680`.
    pub url: String,
    /// The scheme registry.
    pub registry: SchemeRegistry,
    /// Root directory of per-credential-type revocation logs.
    pub revocation_path: PathBuf,
    /// Idle time after which a session times out.
    pub session_timeout: Duration,
    /// How often the background sweep runs.
    pub reap_interval: Duration,
    /// Lowest protocol version the server speaks.
    pub min_version: ProtocolVersion,
    /// Highest protocol version the server speaks.
    pub max_version: ProtocolVersion,
    /// Credential types this server is the revocation authority for; their
    /// record GETs are refused (the authority is the source of truth, not
    /// a mirror).
    pub revocation_authority: HashSet<CredentialTypeId>,
}

impl Configuration {
    /// A configuration with stock lifecycle parameters.
    pub fn new(url: impl Into<String>, registry: SchemeRegistry) -> Self {
        Self {
            url: url.into(),
            registry,
            revocation_path: PathBuf::from("revocation"),
            session_timeout: Duration::minutes(5),
            reap_interval: Duration::seconds(10),
            min_version: ProtocolVersion::new(2, 4),
            max_version: ProtocolVersion::new(2, 7),
            revocation_authority: HashSet::new(),
        }
    }

    /// Set the revocation storage root.
    pub fn with_revocation_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.revocation_path = path.into();
        self
    }

    /// Set the session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Declare this server the revocation authority for `credtype`.
    pub fn with_revocation_authority(mut self, credtype: CredentialTypeId) -> Self {
        self.revocation_authority.insert(credtype);
        self
    }
}
