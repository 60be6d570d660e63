//! # Protocol Message Handlers
//!
//! The handler for each wallet protocol message. Session state is
//! maintained here: every handler first checks the session is in a status
//! that accepts the message (anything else is `UnexpectedRequest`, without
//! a transition), refreshes the activity timestamp, and drives the session
//! forward. JSON (de)serialization is the routing layer's business.

use chrono::Utc;
use rand::rngs::OsRng;

use credo_core::{ErrorKind, ProtocolVersion, RemoteError};
use credo_protocol::{
    Disclosure, IssueCommitmentMessage, IssueSignatureMessage, ProofStatus, SessionAction,
    SessionRequest, SignedMessage, WireSessionRequest,
};
use credo_crypto::{Issuer, Proof};
use credo_revocation::IssuanceRecord;

use crate::session::{Session, Status};
use crate::verify::{
    extract_credential_types, extract_public_keys, verify_disclosure, EngineError,
};
use crate::Server;

impl Server {
    /// `DELETE /` — cancel. Ignored on a session that already finished.
    pub(crate) fn handle_delete(&self, session: &mut Session) {
        if session.status.finished() {
            return;
        }
        session.mark_alive();
        session.set_status(Status::Cancelled);
    }

    /// `GET /status` — idempotent poll, valid in any state.
    pub(crate) fn handle_get_status(&self, session: &Session) -> Status {
        session.status
    }

    /// `GET /` — version negotiation plus the (possibly legacy-rendered,
    /// possibly sanitised) session request. A repeated `GET` on a connected
    /// session replays the first response.
    pub(crate) fn handle_get_request(
        &self,
        session: &mut Session,
        min: ProtocolVersion,
        max: ProtocolVersion,
    ) -> Result<WireSessionRequest, RemoteError> {
        if session.status == Status::Connected {
            if let Some(cached) = session.cached_request.clone() {
                session.mark_alive();
                return Ok(cached);
            }
        }
        if session.status != Status::Initialized {
            return Err(RemoteError::new(
                ErrorKind::UnexpectedRequest,
                "Session already started",
            ));
        }
        session.mark_alive();

        // Attach the latest revocation records here rather than at session
        // start, so the wallet always gets the very latest state to update
        // its witnesses against.
        if let Err(message) = self.attach_revocation_records(&mut session.request) {
            return Err(session.fail(ErrorKind::Unknown, message));
        }

        // Wallets predating the con-dis-con grammar get the legacy
        // rendering, when the request is expressible in it. Revocation
        // keys are stripped before conversion; keys are secret to the
        // issuer.
        let legacy = session.request.sanitized().legacy();
        session.legacy_compatible = legacy.is_ok();
        if legacy.is_err() {
            tracing::info!(token = %session.token, "request has no legacy rendering; pre-2.5 wallets unsupported");
        }

        let Some(version) = credo_core::version::negotiate(
            self.conf.min_version,
            self.conf.max_version,
            min,
            max,
        ) else {
            return Err(session.fail(ErrorKind::ProtocolVersion, ""));
        };
        tracing::debug!(token = %session.token, %version, "protocol version negotiated");
        session.version = Some(version);
        session.request.base_mut().protocol_version = Some(version);

        session.set_status(Status::Connected);

        let response = if version.below(2, 5) {
            match legacy {
                Ok(mut legacy) => {
                    tracing::info!(token = %session.token, "returning legacy session format");
                    legacy.base_mut().protocol_version = Some(version);
                    WireSessionRequest::Legacy(legacy)
                }
                Err(_) => {
                    return Err(session.fail(ErrorKind::ProtocolVersion, ""));
                }
            }
        } else {
            // Issuance requests go out with their revocation keys cleared;
            // keys are secret to the issuer.
            WireSessionRequest::Current(session.request.sanitized())
        };
        session.cached_request = Some(response.clone());
        Ok(response)
    }

    /// `POST /proofs` for disclosure sessions.
    pub(crate) fn handle_post_disclosure(
        &self,
        session: &mut Session,
        disclosure: &Disclosure,
    ) -> Result<ProofStatus, RemoteError> {
        if session.status.finished() {
            if let Some(status) = session.result.proof_status {
                return Ok(status);
            }
        }
        if session.status != Status::Connected || session.action != SessionAction::Disclosing {
            return Err(RemoteError::new(
                ErrorKind::UnexpectedRequest,
                "Session not yet started or already finished",
            ));
        }
        session.mark_alive();

        let SessionRequest::Disclosure(request) = session.request.clone() else {
            return Err(session.fail(ErrorKind::Unknown, "session request kind mismatch"));
        };

        let pubkeys = match extract_public_keys(
            &self.conf.registry,
            disclosure,
            disclosure.proofs.len(),
        ) {
            Ok(keys) => keys,
            Err(e) => return Err(self.fail_engine(session, e)),
        };
        let outcome = match verify_disclosure(
            &self.conf.registry,
            &self.revocation,
            &request.disclose,
            &request.base.revocation,
            &request.base.context,
            &request.base.nonce,
            disclosure,
            &pubkeys,
            disclosure.proofs.len(),
            Utc::now(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail_engine(session, e)),
        };

        session.result.disclosed = outcome.disclosed;
        session.result.proof_status = Some(outcome.status);
        session.set_status(Status::Done);
        Ok(outcome.status)
    }

    /// `POST /proofs` for signature sessions.
    pub(crate) fn handle_post_signature(
        &self,
        session: &mut Session,
        signed: &SignedMessage,
    ) -> Result<ProofStatus, RemoteError> {
        if session.status.finished() {
            if let Some(status) = session.result.proof_status {
                return Ok(status);
            }
        }
        if session.status != Status::Connected || session.action != SessionAction::Signing {
            return Err(RemoteError::new(
                ErrorKind::UnexpectedRequest,
                "Session not yet started or already finished",
            ));
        }
        session.mark_alive();

        let SessionRequest::Signature(request) = session.request.clone() else {
            return Err(session.fail(ErrorKind::Unknown, "session request kind mismatch"));
        };

        session.result.signature = Some(Box::new(signed.clone()));

        // The signature must bind the session's message, nonce and context.
        if signed.message != request.message
            || signed.nonce != request.base.nonce
            || signed.context != request.base.context
        {
            session.result.proof_status = Some(ProofStatus::UnmatchedRequest);
            session.set_status(Status::Done);
            return Ok(ProofStatus::UnmatchedRequest);
        }

        let pubkeys = match extract_public_keys(
            &self.conf.registry,
            &signed.disclosure,
            signed.disclosure.proofs.len(),
        ) {
            Ok(keys) => keys,
            Err(e) => return Err(self.fail_engine(session, e)),
        };
        let effective_nonce = SignedMessage::effective_nonce(&signed.nonce, &signed.message);
        let outcome = match verify_disclosure(
            &self.conf.registry,
            &self.revocation,
            &request.disclose,
            &request.base.revocation,
            &request.base.context,
            &effective_nonce,
            &signed.disclosure,
            &pubkeys,
            signed.disclosure.proofs.len(),
            Utc::now(),
        ) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail_engine(session, e)),
        };

        session.result.disclosed = outcome.disclosed;
        session.result.proof_status = Some(outcome.status);
        session.set_status(Status::Done);
        Ok(outcome.status)
    }

    /// `POST /commitments` — verify the combined proofs and issue.
    pub(crate) fn handle_post_commitments(
        &self,
        session: &mut Session,
        commitments: &IssueCommitmentMessage,
    ) -> Result<Vec<IssueSignatureMessage>, RemoteError> {
        if session.status.finished() {
            if let Some(signatures) = &session.cached_signatures {
                return Ok(signatures.clone());
            }
        }
        if session.status != Status::Connected || session.action != SessionAction::Issuing {
            return Err(RemoteError::new(
                ErrorKind::UnexpectedRequest,
                "Session not yet started or already finished",
            ));
        }
        session.mark_alive();

        let SessionRequest::Issuance(request) = session.request.clone() else {
            return Err(session.fail(ErrorKind::Unknown, "session request kind mismatch"));
        };

        let issue_count = request.credentials.len();
        let proof_count = commitments.combined.proofs.len();
        if proof_count < issue_count {
            return Err(session.fail(ErrorKind::MalformedInput, "Received insufficient proofs"));
        }
        let disclose_count = proof_count - issue_count;

        // Public-key vector: disclosure proofs declare their own keys, the
        // issuance tail comes from the request.
        let mut pubkeys = match extract_public_keys(
            &self.conf.registry,
            &commitments.combined,
            disclose_count,
        ) {
            Ok(keys) => keys,
            Err(e) => return Err(self.fail_engine(session, e)),
        };
        let mut credtypes =
            match extract_credential_types(&self.conf.registry, &commitments.combined, disclose_count)
            {
                Ok(types) => types,
                Err(e) => return Err(self.fail_engine(session, e)),
            };
        for cred in &request.credentials {
            let key = match self
                .conf
                .registry
                .public_key(&cred.credential_type.issuer(), cred.key_counter)
            {
                Ok(key) => key,
                Err(e) => return Err(session.fail(ErrorKind::UnknownPublicKey, e.to_string())),
            };
            pubkeys.push(key);
            credtypes.push(cred.credential_type.clone());
        }

        // Merge keyshare contributions for distributed schemes.
        let mut combined = commitments.combined.clone();
        for (i, proof) in combined.proofs.0.iter_mut().enumerate() {
            let scheme = credtypes[i].scheme();
            let distributed = match self.conf.registry.is_distributed(&scheme) {
                Ok(distributed) => distributed,
                Err(e) => return Err(session.fail(ErrorKind::Unknown, e.to_string())),
            };
            if !distributed {
                continue;
            }
            let Some(proof_p) = commitments.proof_ps.get(&scheme) else {
                return Err(session.fail(
                    ErrorKind::KeyshareProofMissing,
                    format!("no keyshare contribution for scheme {scheme}"),
                ));
            };
            proof.merge_proof_p(proof_p, &pubkeys[i]);
        }

        // Verify all proofs, and the disclosed attributes (if any) against
        // the request.
        let now = Utc::now();
        let outcome = match verify_disclosure(
            &self.conf.registry,
            &self.revocation,
            &request.disclose,
            &request.base.revocation,
            &request.base.context,
            &request.base.nonce,
            &combined,
            &pubkeys,
            disclose_count,
            now,
        ) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail_engine(session, e)),
        };
        session.result.disclosed = outcome.disclosed;
        session.result.proof_status = Some(outcome.status);
        match outcome.status {
            ProofStatus::Valid => {}
            ProofStatus::Expired => {
                return Err(session.fail(ErrorKind::AttributesExpired, ""));
            }
            _ => {
                return Err(session.fail(ErrorKind::InvalidProofs, ""));
            }
        }

        // Compute the CL signatures.
        let mut signatures = Vec::with_capacity(issue_count);
        for (i, cred) in request.credentials.iter().enumerate() {
            let issuer_id = cred.credential_type.issuer();
            let pk = pubkeys[disclose_count + i].clone();
            let sk = match self.conf.registry.private_key(&issuer_id) {
                Ok(sk) => sk,
                Err(e) => return Err(session.fail(ErrorKind::Unknown, e.to_string())),
            };
            let Proof::U(proof_u) = &combined.proofs.0[disclose_count + i] else {
                return Err(session.fail(
                    ErrorKind::MalformedInput,
                    "Received invalid issuance commitment",
                ));
            };
            let info = match self.conf.registry.credential_type(&cred.credential_type) {
                Ok(info) => info,
                Err(e) => return Err(session.fail(ErrorKind::IssuanceFailed, e.to_string())),
            };
            let (attr_ints, metadata) = match cred.attribute_ints(info, now) {
                Ok(res) => res,
                Err(e) => return Err(session.fail(ErrorKind::IssuanceFailed, e.to_string())),
            };

            let mut witness = None;
            let mut nonrev_attr = None;
            if info.supports_revocation {
                let db = match self
                    .revocation
                    .db(&cred.credential_type, pk.revocation_key())
                {
                    Ok(db) => db,
                    Err(e) => return Err(session.fail(ErrorKind::IssuanceFailed, e.to_string())),
                };
                if db.enabled() {
                    let rev_sk = sk.revocation_key();
                    let fresh = match db.generate_witness(&rev_sk) {
                        Ok(w) => w,
                        Err(e) => {
                            return Err(session.fail(ErrorKind::IssuanceFailed, e.to_string()))
                        }
                    };
                    nonrev_attr = Some(fresh.e.clone());
                    let record = IssuanceRecord {
                        key: cred.revocation_key.clone().unwrap_or_default(),
                        e: fresh.e.clone(),
                        issued: now,
                        valid_until: metadata.expiry_time(),
                        revoked_at: None,
                    };
                    if db.add_issuance_record(record).is_err() {
                        return Err(session
                            .fail(ErrorKind::Unknown, "failed to save nonrevocation witness"));
                    }
                    witness = Some(fresh);
                }
            }

            let issuer = Issuer::new(&sk, &pk);
            let mut signature = match issuer.issue_signature(
                &mut OsRng,
                &proof_u.u,
                &attr_ints,
                nonrev_attr.as_ref(),
                &commitments.nonce2,
            ) {
                Ok(signature) => signature,
                Err(e) => return Err(session.fail(ErrorKind::IssuanceFailed, e.to_string())),
            };
            signature.witness = witness;
            signatures.push(signature);
        }

        session.cached_signatures = Some(signatures.clone());
        session.set_status(Status::Done);
        Ok(signatures)
    }

    /// Map an engine failure onto the session and the wire.
    fn fail_engine(&self, session: &mut Session, error: EngineError) -> RemoteError {
        match error {
            EngineError::UnknownPublicKey(message) => {
                session.fail(ErrorKind::UnknownPublicKey, message)
            }
            EngineError::Malformed(message) => session.fail(ErrorKind::MalformedInput, message),
            EngineError::Internal(message) => session.fail(ErrorKind::Unknown, message),
        }
    }

    /// Attach the latest revocation records for every credential type the
    /// request demands non-revocation proofs for.
    fn attach_revocation_records(&self, request: &mut SessionRequest) -> Result<(), String> {
        let required = request.base().revocation.clone();
        for credtype in required {
            let rev_pk = self
                .conf
                .registry
                .revocation_public_key(&credtype.issuer())
                .map_err(|e| e.to_string())?;
            let db = self
                .revocation
                .db(&credtype, rev_pk)
                .map_err(|e| e.to_string())?;
            let records = db.records_since(0);
            request
                .base_mut()
                .revocation_updates
                .insert(credtype, records);
        }
        Ok(())
    }
}
