//! Shared fixtures: a demo scheme with issuer keys, a server over a
//! temporary revocation directory, and an in-process test wallet that
//! builds real proofs with the prover-side crypto.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use num_bigint_dig::BigUint;
use rand::rngs::OsRng;
use serde_json::Value;
use tower::ServiceExt;

use credo_core::{
    AttributeTypeId, CredentialTypeId, CredentialTypeInfo, IssuerId, SchemeId, SchemeInfo,
};
use credo_crypto::bignum::{random_bits, tilde_bits, MESSAGE_BITS};
use credo_crypto::keys::generate_keypair;
use credo_crypto::{
    Credential, EventKind, ProofBuilder, ProofList, ProofUBuilder, PublicKey,
};
use credo_protocol::{
    AttributeIndex, BaseRequest, Disclosure, IssueCommitmentMessage, IssueSignatureMessage,
    IssuanceRequest, SessionRequest, SignedMessage, WireSessionRequest,
};
use credo_server::routes::{app, MAX_VERSION_HEADER, MIN_VERSION_HEADER};
use credo_server::{Configuration, SchemeRegistry, Server, SessionPointer};

/// The demo environment: server, router, and the key material wallets see.
pub struct TestEnv {
    pub server: Arc<Server>,
    pub app: Router,
    pub infos: HashMap<CredentialTypeId, CredentialTypeInfo>,
    pub public_keys: HashMap<IssuerId, PublicKey>,
    _revocation_dir: tempfile::TempDir,
}

pub fn student_card() -> CredentialTypeId {
    CredentialTypeId::new("irma-demo.RU.studentCard").unwrap()
}

pub fn root() -> CredentialTypeId {
    CredentialTypeId::new("irma-demo.MijnOverheid.root").unwrap()
}

pub fn full_name() -> CredentialTypeId {
    CredentialTypeId::new("irma-demo.MijnOverheid.fullName").unwrap()
}

pub fn attr_id(s: &str) -> AttributeTypeId {
    AttributeTypeId::new(s).unwrap()
}

/// Generated scheme material, shareable between servers so that a mirror
/// verifies the same accumulator chains as the authority.
#[derive(Clone)]
pub struct DemoMaterial {
    pub infos: HashMap<CredentialTypeId, CredentialTypeInfo>,
    keys: Vec<(IssuerId, PublicKey, credo_crypto::PrivateKey)>,
}

/// The credential type living in the distributed (keyshare) scheme.
pub fn mijnirma() -> CredentialTypeId {
    CredentialTypeId::new("test.test.mijnirma").unwrap()
}

/// Generate the demo scheme: two issuers, three credential types, plus a
/// distributed scheme with a keyshare-backed credential type.
pub fn demo_material() -> DemoMaterial {
    let ru = IssuerId::new("irma-demo.RU").unwrap();
    let overheid = IssuerId::new("irma-demo.MijnOverheid").unwrap();
    let keyshare_issuer = IssuerId::new("test.test").unwrap();
    let (ru_pk, ru_sk) = generate_keypair(&mut OsRng, 512, 8, 0);
    let (ov_pk, ov_sk) = generate_keypair(&mut OsRng, 512, 8, 0);
    let (ks_pk, ks_sk) = generate_keypair(&mut OsRng, 512, 8, 0);

    let infos: HashMap<CredentialTypeId, CredentialTypeInfo> = [
        CredentialTypeInfo {
            id: student_card(),
            attributes: vec![
                "university".to_string(),
                "studentCardNumber".to_string(),
                "studentID".to_string(),
                "level".to_string(),
            ],
            supports_revocation: false,
        },
        CredentialTypeInfo {
            id: root(),
            attributes: vec!["BSN".to_string()],
            supports_revocation: true,
        },
        CredentialTypeInfo {
            id: full_name(),
            attributes: vec![
                "firstnames".to_string(),
                "firstname".to_string(),
                "familyname".to_string(),
                "prefix".to_string(),
            ],
            supports_revocation: false,
        },
        CredentialTypeInfo {
            id: mijnirma(),
            attributes: vec!["email".to_string()],
            supports_revocation: false,
        },
    ]
    .into_iter()
    .map(|info| (info.id.clone(), info))
    .collect();

    DemoMaterial {
        infos,
        keys: vec![
            (ru, ru_pk, ru_sk),
            (overheid, ov_pk, ov_sk),
            (keyshare_issuer, ks_pk, ks_sk),
        ],
    }
}

static TRACING: std::sync::Once = std::sync::Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Start a server over the given material. `authority` marks credential
/// types this server is the revocation authority for.
pub fn env_from(material: &DemoMaterial, authority: Option<CredentialTypeId>) -> TestEnv {
    init_tracing();
    let revocation_dir = tempfile::tempdir().unwrap();

    let mut builder = SchemeRegistry::builder()
        .scheme(SchemeInfo {
            id: SchemeId::new("irma-demo").unwrap(),
            distributed: false,
        })
        .scheme(SchemeInfo {
            id: SchemeId::new("test").unwrap(),
            distributed: true,
        });
    for (issuer, pk, sk) in &material.keys {
        builder = builder
            .issuer_public_key(issuer.clone(), pk.clone())
            .issuer_private_key(issuer.clone(), sk.clone());
    }
    for info in material.infos.values() {
        builder = builder.credential_type(info.clone());
    }

    let mut conf = Configuration::new("", builder.build())
        .with_revocation_path(revocation_dir.path().to_path_buf());
    if let Some(credtype) = authority {
        conf = conf.with_revocation_authority(credtype);
    }
    let server = Arc::new(Server::new(conf));
    let app = app(server.clone());

    TestEnv {
        server,
        app,
        infos: material.infos.clone(),
        public_keys: material
            .keys
            .iter()
            .map(|(issuer, pk, _)| (issuer.clone(), pk.clone()))
            .collect(),
        _revocation_dir: revocation_dir,
    }
}

/// Build the demo scheme, generate issuer keys, and start a server.
pub fn test_env() -> TestEnv {
    env_from(&demo_material(), None)
}

// ---------------------------------------------------------------------------
// HTTP plumbing
// ---------------------------------------------------------------------------

pub async fn http_request(
    app: &Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn get_session_request(app: &Router, url: &str) -> (StatusCode, Value) {
    http_request(
        app,
        "GET",
        url,
        &[(MIN_VERSION_HEADER, "2.5"), (MAX_VERSION_HEADER, "2.7")],
        None,
    )
    .await
}

// ---------------------------------------------------------------------------
// Test wallet
// ---------------------------------------------------------------------------

/// Why a wallet gave up on a session.
#[derive(Debug)]
pub enum WalletAbort {
    /// The wallet's own credential was revoked; it cancelled the session.
    Revoked,
    /// The request cannot be satisfied with the held credentials.
    CannotSatisfy,
}

/// A credential as held by the wallet, with its attribute values.
pub struct WalletCredential {
    pub credential: Credential,
    pub info: CredentialTypeInfo,
    pub values: BTreeMap<String, String>,
}

/// An in-process wallet: one secret, a pile of credentials, and the
/// prover-side arithmetic to turn requests into proofs.
pub struct TestWallet {
    secret: BigUint,
    pub credentials: Vec<WalletCredential>,
}

impl TestWallet {
    pub fn new() -> Self {
        Self {
            secret: random_bits(&mut OsRng, MESSAGE_BITS - 1),
            credentials: Vec::new(),
        }
    }

    /// Find a credential and slot holding `attr`, honouring a value
    /// constraint.
    fn find_attribute(&self, attr: &AttributeTypeId, required: Option<&str>) -> Option<(usize, usize)> {
        let credtype = attr.credential_type();
        for (i, held) in self.credentials.iter().enumerate() {
            if held.info.id != credtype {
                continue;
            }
            let Some(slot) = held.info.attribute_slot(attr.name()) else {
                continue;
            };
            let value = held.values.get(attr.name()).map(String::as_str);
            match (required, value) {
                (None, Some(_)) => return Some((i, slot)),
                (Some(want), Some(have)) if want == have => return Some((i, slot)),
                _ => continue,
            }
        }
        None
    }

    /// Choose, per disjunction, the first satisfiable conjunction.
    fn choose(
        &self,
        disclose: &credo_core::AttributeConDisCon,
    ) -> Result<Vec<Vec<(usize, usize)>>, WalletAbort> {
        let mut choices = Vec::with_capacity(disclose.len());
        'discons: for discon in &disclose.0 {
            for con in discon {
                let mut picks = Vec::with_capacity(con.len());
                let mut satisfiable = true;
                for request in con {
                    match self.find_attribute(&request.attr_type, request.value.as_deref()) {
                        Some(pick) => picks.push(pick),
                        None => {
                            satisfiable = false;
                            break;
                        }
                    }
                }
                if satisfiable {
                    choices.push(picks);
                    continue 'discons;
                }
            }
            return Err(WalletAbort::CannotSatisfy);
        }
        Ok(choices)
    }

    /// Apply revocation updates to the witnesses of held credentials.
    /// Fails with [`WalletAbort::Revoked`] when an update removes our own
    /// prime.
    pub fn update_witnesses(&mut self, env: &TestEnv, base: &BaseRequest) -> Result<(), WalletAbort> {
        for (credtype, records) in &base.revocation_updates {
            let rev_pk = env.public_keys[&credtype.issuer()].revocation_key();
            for held in &mut self.credentials {
                if &held.info.id != credtype {
                    continue;
                }
                let Some(witness) = held.credential.witness.as_mut() else {
                    continue;
                };
                for record in records {
                    if record.index() <= witness.accumulator_index {
                        continue;
                    }
                    match record.event {
                        EventKind::Issue => {
                            witness.accumulator_index = record.index();
                        }
                        EventKind::Revoke => {
                            if witness.update(&rev_pk, &record.e, &record.accumulator).is_err() {
                                return Err(WalletAbort::Revoked);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Build a disclosure for a request, binding the proofs to `nonce`.
    pub fn build_disclosure(
        &mut self,
        env: &TestEnv,
        base: &BaseRequest,
        disclose: &credo_core::AttributeConDisCon,
        nonce: &BigUint,
    ) -> Result<Disclosure, WalletAbort> {
        self.update_witnesses(env, base)?;
        let choices = self.choose(disclose)?;

        // Group chosen slots per credential, in first-use order.
        let mut used: Vec<usize> = Vec::new();
        let mut slots: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for picks in &choices {
            for (cred, slot) in picks {
                if !used.contains(cred) {
                    used.push(*cred);
                }
                slots.entry(*cred).or_default().insert(*slot);
            }
        }

        let s_tilde = random_bits(&mut OsRng, tilde_bits(MESSAGE_BITS));
        let mut builders = Vec::with_capacity(used.len());
        for cred in &used {
            let held = &self.credentials[*cred];
            // The metadata attribute is always disclosed.
            let mut disclosed: BTreeSet<usize> = slots[cred].clone();
            disclosed.insert(1);
            let with_nonrev = base.revocation.contains(&held.info.id);
            let builder = held
                .credential
                .disclosure_builder(&mut OsRng, &disclosed, &s_tilde, with_nonrev)
                .unwrap();
            builders.push(builder);
        }

        let builder_refs: Vec<&dyn ProofBuilder> =
            builders.iter().map(|b| b as &dyn ProofBuilder).collect();
        let proofs = ProofList::from_builders(&builder_refs, &base.context, nonce);

        let indices = choices
            .iter()
            .map(|picks| {
                picks
                    .iter()
                    .map(|(cred, slot)| AttributeIndex {
                        cred: used.iter().position(|c| c == cred).unwrap(),
                        attr: *slot,
                    })
                    .collect()
            })
            .collect();

        Ok(Disclosure { proofs, indices })
    }

    /// Build the commitment message for an issuance request, returning the
    /// state needed to complete the credentials from the response.
    pub fn build_commitments(
        &mut self,
        env: &TestEnv,
        request: &IssuanceRequest,
    ) -> Result<(IssueCommitmentMessage, PendingIssuance), WalletAbort> {
        self.update_witnesses(env, &request.base)?;
        let choices = self.choose(&request.disclose)?;

        let mut used: Vec<usize> = Vec::new();
        let mut slots: HashMap<usize, BTreeSet<usize>> = HashMap::new();
        for picks in &choices {
            for (cred, slot) in picks {
                if !used.contains(cred) {
                    used.push(*cred);
                }
                slots.entry(*cred).or_default().insert(*slot);
            }
        }

        let s_tilde = random_bits(&mut OsRng, tilde_bits(MESSAGE_BITS));
        let mut d_builders = Vec::with_capacity(used.len());
        for cred in &used {
            let held = &self.credentials[*cred];
            let mut disclosed: BTreeSet<usize> = slots[cred].clone();
            disclosed.insert(1);
            let with_nonrev = request.base.revocation.contains(&held.info.id);
            d_builders.push(
                held.credential
                    .disclosure_builder(&mut OsRng, &disclosed, &s_tilde, with_nonrev)
                    .unwrap(),
            );
        }

        let mut u_builders = Vec::with_capacity(request.credentials.len());
        for cred in &request.credentials {
            let pk = env.public_keys[&cred.credential_type.issuer()].clone();
            u_builders.push(ProofUBuilder::new(&mut OsRng, &pk, &self.secret, &s_tilde).unwrap());
        }

        let mut builder_refs: Vec<&dyn ProofBuilder> = Vec::new();
        builder_refs.extend(d_builders.iter().map(|b| b as &dyn ProofBuilder));
        builder_refs.extend(u_builders.iter().map(|b| b as &dyn ProofBuilder));
        let nonce2 = random_bits(&mut OsRng, 256);
        let proofs = ProofList::from_builders(&builder_refs, &request.base.context, &request.base.nonce);

        let indices = choices
            .iter()
            .map(|picks| {
                picks
                    .iter()
                    .map(|(cred, slot)| AttributeIndex {
                        cred: used.iter().position(|c| c == cred).unwrap(),
                        attr: *slot,
                    })
                    .collect()
            })
            .collect();

        let pending = PendingIssuance {
            v_primes: u_builders.iter().map(|b| b.v_prime().clone()).collect(),
            nonce2: nonce2.clone(),
            requests: request.credentials.clone(),
        };

        Ok((
            IssueCommitmentMessage {
                combined: Disclosure { proofs, indices },
                nonce2,
                proof_ps: BTreeMap::new(),
            },
            pending,
        ))
    }

    /// Complete issuance: verify the issuer's signatures and store the new
    /// credentials.
    pub fn complete_issuance(
        &mut self,
        env: &TestEnv,
        pending: PendingIssuance,
        signatures: Vec<IssueSignatureMessage>,
    ) {
        assert_eq!(signatures.len(), pending.requests.len());
        for (i, issued) in signatures.iter().enumerate() {
            let request = &pending.requests[i];
            let info = env.infos[&request.credential_type].clone();
            let pk = &env.public_keys[&request.credential_type.issuer()];
            let (attrs, _) = request.attribute_ints(&info, chrono::Utc::now()).unwrap();
            let credential = Credential::from_issuance(
                pk,
                issued,
                &self.secret,
                &pending.v_primes[i],
                &attrs,
                &pending.nonce2,
            )
            .unwrap();
            self.credentials.push(WalletCredential {
                credential,
                info,
                values: request.attributes.clone(),
            });
        }
    }
}

pub struct PendingIssuance {
    v_primes: Vec<BigUint>,
    nonce2: BigUint,
    requests: Vec<credo_protocol::CredentialRequest>,
}

/// Drive a full session over the HTTP surface, as a wallet would.
///
/// Returns the terminal HTTP status of the final POST (or `Err` when the
/// wallet aborted and deleted the session).
pub async fn run_session(
    env: &TestEnv,
    wallet: &mut TestWallet,
    pointer: &SessionPointer,
) -> Result<(StatusCode, Value), WalletAbort> {
    let url = &pointer.url;
    let (status, body) = get_session_request(&env.app, url).await;
    assert_eq!(status, StatusCode::OK, "GET session request failed: {body}");
    let request: WireSessionRequest = serde_json::from_value(body).unwrap();
    let WireSessionRequest::Current(request) = request else {
        panic!("expected current-format request");
    };

    let outcome = match &request {
        SessionRequest::Disclosure(r) => {
            let disclosure = match wallet.build_disclosure(env, &r.base, &r.disclose, &r.base.nonce)
            {
                Ok(disclosure) => disclosure,
                Err(abort) => {
                    abort_session(env, url).await;
                    return Err(abort);
                }
            };
            http_request(
                &env.app,
                "POST",
                &format!("{url}/proofs"),
                &[],
                Some(serde_json::to_value(&disclosure).unwrap()),
            )
            .await
        }
        SessionRequest::Signature(r) => {
            let nonce = SignedMessage::effective_nonce(&r.base.nonce, &r.message);
            let disclosure = match wallet.build_disclosure(env, &r.base, &r.disclose, &nonce) {
                Ok(disclosure) => disclosure,
                Err(abort) => {
                    abort_session(env, url).await;
                    return Err(abort);
                }
            };
            let signed = SignedMessage {
                disclosure,
                nonce: r.base.nonce.clone(),
                context: r.base.context.clone(),
                message: r.message.clone(),
                timestamp: chrono::Utc::now().timestamp(),
            };
            http_request(
                &env.app,
                "POST",
                &format!("{url}/proofs"),
                &[],
                Some(serde_json::to_value(&signed).unwrap()),
            )
            .await
        }
        SessionRequest::Issuance(r) => {
            let (message, pending) = match wallet.build_commitments(env, r) {
                Ok(res) => res,
                Err(abort) => {
                    abort_session(env, url).await;
                    return Err(abort);
                }
            };
            let (status, body) = http_request(
                &env.app,
                "POST",
                &format!("{url}/commitments"),
                &[],
                Some(serde_json::to_value(&message).unwrap()),
            )
            .await;
            if status == StatusCode::OK {
                let signatures: Vec<IssueSignatureMessage> =
                    serde_json::from_value(body.clone()).unwrap();
                wallet.complete_issuance(env, pending, signatures);
            }
            (status, body)
        }
    };
    Ok(outcome)
}

async fn abort_session(env: &TestEnv, url: &str) {
    let (status, _) = http_request(&env.app, "DELETE", url, &[], None).await;
    assert!(status.is_success());
}

// ---------------------------------------------------------------------------
// Stock requests
// ---------------------------------------------------------------------------

/// An issuance request for a full student card.
pub fn student_card_request() -> SessionRequest {
    SessionRequest::Issuance(IssuanceRequest {
        base: BaseRequest::default(),
        disclose: Default::default(),
        credentials: vec![credo_protocol::CredentialRequest {
            credential_type: student_card(),
            attributes: [
                ("university".to_string(), "Radboud".to_string()),
                ("studentCardNumber".to_string(), "31415927".to_string()),
                ("studentID".to_string(), "s1234567".to_string()),
                ("level".to_string(), "42".to_string()),
            ]
            .into(),
            validity: None,
            key_counter: 0,
            revocation_key: None,
        }],
    })
}

/// An issuance request for the revocable root credential.
pub fn root_request(revocation_key: &str) -> SessionRequest {
    SessionRequest::Issuance(IssuanceRequest {
        base: BaseRequest::default(),
        disclose: Default::default(),
        credentials: vec![credo_protocol::CredentialRequest {
            credential_type: root(),
            attributes: [("BSN".to_string(), "299792458".to_string())].into(),
            validity: None,
            key_counter: 0,
            revocation_key: Some(revocation_key.to_string()),
        }],
    })
}

/// A disclosure request over a set of attribute identifiers, one
/// single-attribute disjunction each.
pub fn disclosure_request(attrs: &[&str]) -> SessionRequest {
    use credo_core::{AttributeConDisCon, AttributeRequest};
    SessionRequest::Disclosure(credo_protocol::DisclosureRequest {
        base: BaseRequest::default(),
        disclose: AttributeConDisCon(
            attrs
                .iter()
                .map(|a| vec![vec![AttributeRequest::new(attr_id(a))]])
                .collect(),
        ),
    })
}

/// Run a full issuance session, asserting success.
pub async fn issue(env: &TestEnv, wallet: &mut TestWallet, request: SessionRequest) {
    let (pointer, token) = env.server.start_session(request, None).unwrap();
    let (status, body) = run_session(env, wallet, &pointer).await.unwrap();
    assert_eq!(status, StatusCode::OK, "issuance failed: {body}");
    let result = env.server.session_result(&token).unwrap();
    assert_eq!(result.status, credo_server::Status::Done);
}
