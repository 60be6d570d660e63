//! # Sessions and the Session Store
//!
//! A [`Session`] is exclusively owned by the [`SessionStore`] and mutated
//! only under its own lock; the store itself holds just a short-lived
//! lookup lock (a sharded concurrent map). Status advances only forward:
//! `Initialized → Connected → {Done, Cancelled, Timeout}`. Terminal status
//! is delivered exactly once to the requestor's callback, which receives
//! the token, never a session reference.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use credo_core::{DisclosedAttribute, ErrorKind, ProtocolVersion, RemoteError};
use credo_protocol::{
    IssueSignatureMessage, ProofStatus, SessionAction, SessionRequest, SignedMessage,
    WireSessionRequest,
};

/// Length of a session token: 128 bits of OS entropy, alphanumeric-encoded.
const TOKEN_LENGTH: usize = 22;

/// An unpredictable, process-unique session token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh token from the OS random source.
    pub fn random() -> Self {
        let token: String = (0..TOKEN_LENGTH)
            .map(|_| OsRng.sample(Alphanumeric) as char)
            .collect();
        Self(token)
    }

    /// The token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Session status, advancing only forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Created, wallet not yet connected.
    Initialized,
    /// Wallet fetched the request.
    Connected,
    /// Cancelled by the wallet, or failed. Terminal.
    Cancelled,
    /// Completed successfully. Terminal.
    Done,
    /// Expired by inactivity. Terminal.
    Timeout,
}

impl Status {
    /// Whether this status is terminal.
    pub fn finished(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Done | Self::Timeout)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initialized => "INITIALIZED",
            Self::Connected => "CONNECTED",
            Self::Cancelled => "CANCELLED",
            Self::Done => "DONE",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// The accumulated outcome of a session, delivered to the requestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// The session token.
    pub token: SessionToken,
    /// The session kind.
    #[serde(rename = "type")]
    pub action: SessionAction,
    /// Terminal (or current) status.
    pub status: Status,
    /// Verification outcome of the posted proofs.
    #[serde(rename = "proofStatus", default, skip_serializing_if = "Option::is_none")]
    pub proof_status: Option<ProofStatus>,
    /// Disclosed attributes, mirroring the request's disjunction shape.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disclosed: Vec<Vec<DisclosedAttribute>>,
    /// The detached signature, for signature sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Box<SignedMessage>>,
    /// The error that terminated the session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<RemoteError>,
}

impl SessionResult {
    fn new(token: SessionToken, action: SessionAction, status: Status) -> Self {
        Self {
            token,
            action,
            status,
            proof_status: None,
            disclosed: Vec::new(),
            signature: None,
            err: None,
        }
    }
}

/// Callback invoked exactly once when a session reaches a terminal status.
pub type DoneCallback = Box<dyn Fn(&SessionResult) + Send>;

/// One session's full state.
pub struct Session {
    /// The token.
    pub token: SessionToken,
    /// The session kind.
    pub action: SessionAction,
    /// Current status.
    pub status: Status,
    /// Negotiated protocol version, set on `GetRequest`.
    pub version: Option<ProtocolVersion>,
    /// The accepted request; issuance requests keep their revocation keys
    /// here (wallets only ever see the sanitised copy).
    pub request: SessionRequest,
    /// Whether the request can be rendered in the legacy format.
    pub legacy_compatible: bool,
    /// The accumulated result.
    pub result: SessionResult,
    /// Last wallet activity.
    pub last_active: DateTime<Utc>,
    /// Replay cache for `GetRequest`.
    pub(crate) cached_request: Option<WireSessionRequest>,
    /// Replay cache for `PostCommitments`.
    pub(crate) cached_signatures: Option<Vec<IssueSignatureMessage>>,
    done_callback: Option<DoneCallback>,
}

impl Session {
    /// Create a session in `Initialized` over an accepted request.
    pub fn new(request: SessionRequest, done_callback: Option<DoneCallback>) -> Self {
        let token = SessionToken::random();
        let action = request.action();
        Self {
            result: SessionResult::new(token.clone(), action, Status::Initialized),
            token,
            action,
            status: Status::Initialized,
            version: None,
            request,
            legacy_compatible: false,
            last_active: Utc::now(),
            cached_request: None,
            cached_signatures: None,
            done_callback,
        }
    }

    /// Refresh the activity timestamp.
    pub fn mark_alive(&mut self) {
        self.last_active = Utc::now();
    }

    /// Advance the status. Repeated terminal transitions are discarded;
    /// the first terminal transition fires the done callback exactly once.
    pub fn set_status(&mut self, status: Status) {
        if self.status.finished() {
            return;
        }
        tracing::debug!(token = %self.token, from = %self.status, to = %status, "session status");
        self.status = status;
        self.result.status = status;
        if status.finished() {
            if let Some(callback) = self.done_callback.take() {
                callback(&self.result);
            }
        }
    }

    /// Record a failure: the session moves to `Cancelled` with the error on
    /// its result, and the error envelope is returned for the wire.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> RemoteError {
        let err = RemoteError::new(kind, message);
        self.result.err = Some(err.clone());
        self.set_status(Status::Cancelled);
        err
    }

    /// Whether the session has outlived `timeout` without activity.
    pub fn expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.last_active + timeout < now
    }
}

/// Concurrent map from token to session.
///
/// Per-session access is serialised by the session's own mutex; the map
/// itself only guards insertion and lookup.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionToken, Arc<Mutex<Session>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, returning its token.
    pub fn insert(&self, session: Session) -> SessionToken {
        let token = session.token.clone();
        self.sessions
            .insert(token.clone(), Arc::new(Mutex::new(session)));
        token
    }

    /// Look up a session by token.
    pub fn lookup(&self, token: &SessionToken) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(token).map(|s| s.value().clone())
    }

    /// Remove a session.
    pub fn remove(&self, token: &SessionToken) -> Option<Arc<Mutex<Session>>> {
        self.sessions.remove(token).map(|(_, s)| s)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Move sessions idle past `timeout` to `Timeout` (firing their done
    /// callbacks), and drop terminal sessions idle past the same window.
    pub fn reap_expired(&self, now: DateTime<Utc>, timeout: Duration) {
        let mut drop_tokens = Vec::new();
        for entry in self.sessions.iter() {
            let mut session = entry.value().lock();
            if !session.expired(now, timeout) {
                continue;
            }
            if session.status.finished() {
                drop_tokens.push(session.token.clone());
            } else {
                tracing::info!(token = %session.token, "session timed out");
                session.set_status(Status::Timeout);
            }
        }
        for token in drop_tokens {
            self.sessions.remove(&token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use credo_protocol::DisclosureRequest;

    fn disclosure_session(callback: Option<DoneCallback>) -> Session {
        Session::new(
            SessionRequest::Disclosure(DisclosureRequest::default()),
            callback,
        )
    }

    #[test]
    fn tokens_are_unique_and_opaque() {
        let tokens: HashSet<String> = (0..512)
            .map(|_| SessionToken::random().as_str().to_string())
            .collect();
        assert_eq!(tokens.len(), 512);
        assert!(tokens.iter().all(|t| t.len() == TOKEN_LENGTH));
        assert!(tokens
            .iter()
            .all(|t| t.chars().all(|c| c.is_ascii_alphanumeric())));
    }

    #[test]
    fn status_graph_is_forward_only() {
        let mut session = disclosure_session(None);
        assert_eq!(session.status, Status::Initialized);
        session.set_status(Status::Connected);
        session.set_status(Status::Done);
        // A later transition on a terminal session is discarded.
        session.set_status(Status::Cancelled);
        assert_eq!(session.status, Status::Done);
    }

    #[test]
    fn done_callback_fires_exactly_once() {
        static FIRED: AtomicUsize = AtomicUsize::new(0);
        let mut session = disclosure_session(Some(Box::new(|result| {
            assert_eq!(result.status, Status::Cancelled);
            FIRED.fetch_add(1, Ordering::SeqCst);
        })));
        session.set_status(Status::Connected);
        session.set_status(Status::Cancelled);
        session.set_status(Status::Timeout);
        session.set_status(Status::Cancelled);
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_populates_result() {
        let mut session = disclosure_session(None);
        let err = session.fail(ErrorKind::InvalidProofs, "bad");
        assert_eq!(err.kind(), ErrorKind::InvalidProofs);
        assert_eq!(session.status, Status::Cancelled);
        assert_eq!(
            session.result.err.as_ref().unwrap().kind(),
            ErrorKind::InvalidProofs
        );
    }

    #[test]
    fn reap_times_out_idle_sessions() {
        let store = SessionStore::new();
        let mut session = disclosure_session(None);
        session.last_active = Utc::now() - Duration::minutes(10);
        let token = store.insert(session);

        store.reap_expired(Utc::now(), Duration::minutes(5));
        let session = store.lookup(&token).unwrap();
        assert_eq!(session.lock().status, Status::Timeout);

        // A second sweep after the timeout window drops the terminal session.
        session.lock().last_active = Utc::now() - Duration::minutes(10);
        store.reap_expired(Utc::now(), Duration::minutes(5));
        assert!(store.lookup(&token).is_none());
    }

    #[test]
    fn reap_leaves_active_sessions() {
        let store = SessionStore::new();
        let token = store.insert(disclosure_session(None));
        store.reap_expired(Utc::now(), Duration::minutes(5));
        assert_eq!(store.lookup(&token).unwrap().lock().status, Status::Initialized);
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(serde_json::to_string(&Status::Connected).unwrap(), "\"CONNECTED\"");
        let s: Status = serde_json::from_str("\"TIMEOUT\"").unwrap();
        assert_eq!(s, Status::Timeout);
    }

    #[test]
    fn result_wire_shape() {
        let session = disclosure_session(None);
        let json = serde_json::to_value(&session.result).unwrap();
        assert_eq!(json["type"], "disclosing");
        assert_eq!(json["status"], "INITIALIZED");
        assert!(json.get("proofStatus").is_none());
    }
}
