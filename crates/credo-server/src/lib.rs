//! # credo-server — The Session Server
//!
//! The security-critical heart of the credo stack: per-session protocol
//! sequencing with version negotiation, a concurrent session store with
//! background reaping, proof verification orchestration (including
//! keyshare contribution merging), issuance signing with non-revocation
//! witness generation, and the server-to-server revocation record
//! dispatch.
//!
//! Requestors drive sessions through the in-process API
//! ([`Server::start_session`], [`Server::session_result`]); wallets drive
//! them over the token-scoped HTTP surface assembled by [`routes::app`].

pub mod config;
pub mod registry;
pub mod routes;
pub mod session;

mod handle;
mod verify;

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credo_core::{CredentialTypeId, ErrorKind, RemoteError};
use credo_crypto::{bignum, RevocationRecord};
use credo_protocol::{RequestError, SessionAction, SessionRequest};
use credo_revocation::{RevocationDb, RevocationError, RevocationRegistry};

pub use config::Configuration;
pub use registry::{RegistryError, SchemeRegistry, SchemeRegistryBuilder};
pub use session::{DoneCallback, Session, SessionResult, SessionStore, SessionToken, Status};

/// Errors from [`Server::start_session`]: the request was rejected before
/// any session state was allocated.
#[derive(Error, Debug)]
pub enum StartError {
    /// An identifier in the request is not known to any loaded scheme.
    #[error("unknown identifier {0}")]
    UnknownIdentifier(String),

    /// The request is structurally invalid.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Non-revocation was demanded of a type without revocation support.
    #[error("credential type {0} does not support revocation")]
    RevocationUnsupported(CredentialTypeId),
}

/// Errors from issuer-side revocation administration.
#[derive(Error, Debug)]
pub enum AdminError {
    /// Key material lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The revocation store rejected the operation.
    #[error(transparent)]
    Revocation(#[from] RevocationError),
}

/// What a requestor scans or taps to hand the session to a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPointer {
    /// The token-scoped session URL.
    #[serde(rename = "u")]
    pub url: String,
    /// The session kind.
    #[serde(rename = "irmaqr")]
    pub action: SessionAction,
}

/// The session server.
pub struct Server {
    pub(crate) conf: Configuration,
    pub(crate) store: SessionStore,
    pub(crate) revocation: RevocationRegistry,
}

impl Server {
    /// Build a server over a configuration.
    pub fn new(conf: Configuration) -> Self {
        let revocation = RevocationRegistry::new(conf.revocation_path.clone());
        Self {
            conf,
            store: SessionStore::new(),
            revocation,
        }
    }

    /// The configuration.
    pub fn configuration(&self) -> &Configuration {
        &self.conf
    }

    /// Start a session over an accepted request.
    ///
    /// Validation happens before a token is allocated: unknown identifiers
    /// and malformed requests leave no trace. The done callback fires
    /// exactly once, when the session reaches a terminal status.
    pub fn start_session(
        &self,
        mut request: SessionRequest,
        done: Option<DoneCallback>,
    ) -> Result<(SessionPointer, SessionToken), StartError> {
        request.validate()?;
        self.validate_identifiers(&request)?;

        // Fresh cryptographic context and nonce for the session's proofs.
        let action = request.action();
        let base = request.base_mut();
        base.context = bignum::random_bits(&mut OsRng, 256);
        base.nonce = bignum::random_bits(&mut OsRng, 256);
        if base.ld_context.is_empty() {
            base.ld_context = match action {
                SessionAction::Disclosing => credo_protocol::request::LD_CONTEXT_DISCLOSURE,
                SessionAction::Signing => credo_protocol::request::LD_CONTEXT_SIGNATURE,
                SessionAction::Issuing => credo_protocol::request::LD_CONTEXT_ISSUANCE,
            }
            .to_string();
        }
        let session = Session::new(request, done);
        let token = self.store.insert(session);
        tracing::info!(%token, ?action, "session started");

        Ok((
            SessionPointer {
                url: format!("{}/session/{token}", self.conf.url),
                action,
            },
            token,
        ))
    }

    /// The current result of a session, if the token is live.
    pub fn session_result(&self, token: &SessionToken) -> Option<SessionResult> {
        self.store
            .lookup(token)
            .map(|session| session.lock().result.clone())
    }

    /// The current status of a session, if the token is live.
    pub fn session_status(&self, token: &SessionToken) -> Option<Status> {
        self.store
            .lookup(token)
            .map(|session| session.lock().status)
    }

    /// Requestor-side cancel. Idempotent; `false` when the token is
    /// unknown.
    pub fn cancel_session(&self, token: &SessionToken) -> bool {
        match self.store.lookup(token) {
            Some(session) => {
                self.handle_delete(&mut session.lock());
                true
            }
            None => false,
        }
    }

    /// Sweep expired sessions once.
    pub fn reap_expired(&self) {
        self.store
            .reap_expired(Utc::now(), self.conf.session_timeout);
    }

    /// The revocation database for `credtype`.
    pub fn revocation_db(&self, credtype: &CredentialTypeId) -> Result<Arc<RevocationDb>, AdminError> {
        let rev_pk = self
            .conf
            .registry
            .revocation_public_key(&credtype.issuer())?;
        Ok(self.revocation.db(credtype, rev_pk)?)
    }

    /// Enable revocation for `credtype`: create its initial accumulator.
    pub fn enable_revocation(&self, credtype: &CredentialTypeId) -> Result<(), AdminError> {
        let sk = self
            .conf
            .registry
            .revocation_private_key(&credtype.issuer())?;
        self.revocation_db(credtype)?.enable(&sk)?;
        Ok(())
    }

    /// Revoke a previously issued credential by its revocation key.
    pub fn revoke(&self, credtype: &CredentialTypeId, key: &str) -> Result<(), AdminError> {
        let sk = self
            .conf
            .registry
            .revocation_private_key(&credtype.issuer())?;
        self.revocation_db(credtype)?.revoke(&sk, key)?;
        Ok(())
    }

    /// `POST /revocation/records/{credtype}` — accept a batch from an
    /// upstream revocation authority.
    pub fn add_revocation_records(
        &self,
        credtype: &CredentialTypeId,
        records: &[RevocationRecord],
    ) -> Result<(), RemoteError> {
        let db = self
            .revocation_db(credtype)
            .map_err(|e| RemoteError::new(ErrorKind::Unknown, e.to_string()))?;
        db.add_records(records)
            .map_err(|e| RemoteError::new(ErrorKind::Unknown, e.to_string()))
    }

    /// `GET /revocation/records/{credtype}/{index}` — records with a
    /// higher index. Refused when this server is the authority for the
    /// type.
    pub fn revocation_records(
        &self,
        credtype: &CredentialTypeId,
        since: u64,
    ) -> Result<Vec<RevocationRecord>, RemoteError> {
        if self.conf.revocation_authority.contains(credtype) {
            return Err(RemoteError::new(
                ErrorKind::InvalidRequest,
                "not supported by this server",
            ));
        }
        let db = self
            .revocation_db(credtype)
            .map_err(|e| RemoteError::new(ErrorKind::Unknown, e.to_string()))?;
        Ok(db.records_since(since))
    }

    /// Identifier-level validation against the registry, before any state
    /// is allocated.
    fn validate_identifiers(&self, request: &SessionRequest) -> Result<(), StartError> {
        let registry = &self.conf.registry;

        for attr in request.disclosed_attribute_types() {
            registry
                .attribute_type(attr)
                .map_err(|e| StartError::UnknownIdentifier(e.to_string()))?;
        }

        for credtype in &request.base().revocation {
            let supports = registry
                .supports_revocation(credtype)
                .map_err(|e| StartError::UnknownIdentifier(e.to_string()))?;
            if !supports {
                return Err(StartError::RevocationUnsupported(credtype.clone()));
            }
        }

        if let SessionRequest::Issuance(issuance) = request {
            for cred in &issuance.credentials {
                let info = registry
                    .credential_type(&cred.credential_type)
                    .map_err(|e| StartError::UnknownIdentifier(e.to_string()))?;
                registry
                    .public_key(&cred.credential_type.issuer(), cred.key_counter)
                    .map_err(|e| StartError::UnknownIdentifier(e.to_string()))?;
                registry
                    .private_key(&cred.credential_type.issuer())
                    .map_err(|e| StartError::UnknownIdentifier(e.to_string()))?;

                // Revocation keys are mandatory exactly for revocable types.
                if info.supports_revocation && cred.revocation_key.is_none() {
                    return Err(RequestError::MissingRevocationKey(
                        cred.credential_type.clone(),
                    )
                    .into());
                }
                if !info.supports_revocation && cred.revocation_key.is_some() {
                    return Err(RequestError::UnexpectedRevocationKey(
                        cred.credential_type.clone(),
                    )
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Spawn the background sweep moving idle sessions to `Timeout`.
pub fn spawn_reaper(server: Arc<Server>) -> tokio::task::JoinHandle<()> {
    let interval = server
        .conf
        .reap_interval
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            server.reap_expired();
        }
    })
}
