//! # HTTP Surface
//!
//! Thin axum routing over the protocol handlers: deserialize, look the
//! session up, take its lock, delegate, and map outcomes to responses.
//! No session logic lives here.
//!
//! Wallet endpoints are token-scoped under `/session/{token}`; the
//! server-to-server revocation dispatch lives under
//! `/revocation/records/{credtype}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use credo_core::{CredentialTypeId, ErrorKind, ProtocolVersion, RemoteError};
use credo_crypto::RevocationRecord;
use credo_protocol::{Disclosure, IssueCommitmentMessage, SessionAction, SignedMessage};

use crate::session::SessionToken;
use crate::Server;

/// Header carrying the wallet's minimum supported protocol version.
pub const MIN_VERSION_HEADER: &str = "X-IRMA-MinProtocolVersion";
/// Header carrying the wallet's maximum supported protocol version.
pub const MAX_VERSION_HEADER: &str = "X-IRMA-MaxProtocolVersion";

/// Wire error wrapper implementing [`IntoResponse`].
struct ApiError(RemoteError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "protocol error");
        } else {
            tracing::debug!(error = %self.0, "protocol error");
        }
        (status, Json(self.0)).into_response()
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        Self(err)
    }
}

fn session_unknown() -> ApiError {
    ApiError(RemoteError::new(
        ErrorKind::InvalidRequest,
        "session unknown or expired",
    ))
}

fn malformed(message: impl std::fmt::Display) -> ApiError {
    ApiError(RemoteError::new(ErrorKind::MalformedInput, message.to_string()))
}

/// Assemble the full application router.
pub fn app(server: Arc<Server>) -> Router {
    Router::new()
        .route("/session/:token", get(get_request).delete(delete_session))
        .route("/session/:token/status", get(get_status))
        .route("/session/:token/proofs", post(post_proofs))
        .route("/session/:token/commitments", post(post_commitments))
        .route("/revocation/records/:credtype", post(post_revocation_records))
        .route(
            "/revocation/records/:credtype/:index",
            get(get_revocation_records),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

fn parse_version_header(
    headers: &HeaderMap,
    name: &str,
) -> Result<ProtocolVersion, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| malformed(format!("missing header {name}")))?
        .parse()
        .map_err(|_| malformed(format!("malformed header {name}")))
}

/// `GET /session/{token}` — the session request, negotiating the protocol
/// version from the wallet's version headers.
async fn get_request(
    State(server): State<Arc<Server>>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = SessionToken::from(token);
    let session = server.store.lookup(&token).ok_or_else(session_unknown)?;
    let min = parse_version_header(&headers, MIN_VERSION_HEADER)?;
    let max = parse_version_header(&headers, MAX_VERSION_HEADER)?;

    let mut session = session.lock();
    let request = server.handle_get_request(&mut session, min, max)?;
    Ok(Json(request).into_response())
}

/// `GET /session/{token}/status`.
async fn get_status(
    State(server): State<Arc<Server>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let token = SessionToken::from(token);
    let session = server.store.lookup(&token).ok_or_else(session_unknown)?;
    let status = server.handle_get_status(&session.lock());
    Ok(Json(status).into_response())
}

/// `DELETE /session/{token}` — cancel; idempotent.
async fn delete_session(
    State(server): State<Arc<Server>>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token = SessionToken::from(token);
    let session = server.store.lookup(&token).ok_or_else(session_unknown)?;
    server.handle_delete(&mut session.lock());
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /session/{token}/proofs` — a `Disclosure` for disclosure
/// sessions, a `SignedMessage` for signature sessions.
async fn post_proofs(
    State(server): State<Arc<Server>>,
    Path(token): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let token = SessionToken::from(token);
    let session = server.store.lookup(&token).ok_or_else(session_unknown)?;
    let mut session = session.lock();

    let status = match session.action {
        SessionAction::Disclosing => {
            let disclosure: Disclosure = serde_json::from_value(body).map_err(malformed)?;
            server.handle_post_disclosure(&mut session, &disclosure)?
        }
        SessionAction::Signing => {
            let signed: SignedMessage = serde_json::from_value(body).map_err(malformed)?;
            server.handle_post_signature(&mut session, &signed)?
        }
        SessionAction::Issuing => {
            return Err(ApiError(RemoteError::new(
                ErrorKind::UnexpectedRequest,
                "issuance sessions take commitments",
            )))
        }
    };
    Ok(Json(status).into_response())
}

/// `POST /session/{token}/commitments` — issuance.
async fn post_commitments(
    State(server): State<Arc<Server>>,
    Path(token): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let token = SessionToken::from(token);
    let session = server.store.lookup(&token).ok_or_else(session_unknown)?;
    let commitments: IssueCommitmentMessage = serde_json::from_value(body).map_err(malformed)?;
    let mut session = session.lock();
    let signatures = server.handle_post_commitments(&mut session, &commitments)?;
    Ok(Json(signatures).into_response())
}

fn parse_credtype(raw: &str) -> Result<CredentialTypeId, ApiError> {
    raw.parse().map_err(|_| {
        ApiError(RemoteError::new(
            ErrorKind::InvalidRequest,
            format!("malformed credential type {raw:?}"),
        ))
    })
}

/// `POST /revocation/records/{credtype}` — accept a record batch from the
/// upstream revocation authority.
async fn post_revocation_records(
    State(server): State<Arc<Server>>,
    Path(credtype): Path<String>,
    Json(records): Json<Vec<RevocationRecord>>,
) -> Result<StatusCode, ApiError> {
    let credtype = parse_credtype(&credtype)?;
    server.add_revocation_records(&credtype, &records)?;
    Ok(StatusCode::OK)
}

/// `GET /revocation/records/{credtype}/{index}` — records newer than
/// `index`.
async fn get_revocation_records(
    State(server): State<Arc<Server>>,
    Path((credtype, index)): Path<(String, u64)>,
) -> Result<Response, ApiError> {
    let credtype = parse_credtype(&credtype)?;
    let records = server.revocation_records(&credtype, index)?;
    Ok(Json(records).into_response())
}
