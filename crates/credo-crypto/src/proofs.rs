//! # Zero-Knowledge Proofs
//!
//! The proofs exchanged by the wallet protocol:
//!
//! - [`ProofD`] — disclosure: knowledge of a CL signature over a partially
//!   revealed attribute vector.
//! - [`ProofU`] — issuance commitment: knowledge of the secret and blinding
//!   inside a commitment `U = S^{v'}·R_0^{s}`.
//! - [`ProofP`] — a keyshare server's contribution covering its share of
//!   the wallet secret, merged into a wallet proof before verification.
//!
//! Multiple proofs in one message share a single Fiat–Shamir challenge:
//! the challenge hashes the context, every proof's public value and
//! commitment in order, and the session nonce. All proofs of one wallet
//! also share the commitment randomness of the secret, which makes the
//! secret's Schnorr responses identical across proofs — verifiers check
//! this to stop credential pooling.

use std::collections::{BTreeMap, BTreeSet};

use num_bigint_dig::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::accumulator::Witness;
use crate::bignum::{
    self, hash_commit, mod_inv, random_bits, tilde_bits, MESSAGE_BITS, STAT_HIDING_BITS,
};
use crate::error::CryptoError;
use crate::keys::PublicKey;
use crate::signature::ClSignature;

/// Hash the shared challenge for a list of proofs.
///
/// `contributions` is the flattened sequence of each proof's public value
/// and commitment, in proof order.
pub fn proof_list_challenge(
    context: &BigUint,
    nonce: &BigUint,
    contributions: &[BigUint],
) -> BigUint {
    let mut values: Vec<&BigUint> = Vec::with_capacity(contributions.len() + 2);
    values.push(context);
    values.extend(contributions.iter());
    values.push(nonce);
    hash_commit(&values)
}

/// Commitment-phase state of a proof under construction.
///
/// Builders contribute their public value and commitment to the shared
/// challenge, then turn the challenge into Schnorr responses.
pub trait ProofBuilder {
    /// The public value and commitment, in challenge order.
    fn commitments(&self) -> Vec<BigUint>;
    /// Produce the finished proof for the shared challenge.
    fn finish(&self, challenge: &BigUint) -> Proof;
}

// ---------------------------------------------------------------------------
// ProofU — issuance commitment
// ---------------------------------------------------------------------------

/// Proof of knowledge of `(s, v')` inside `U = S^{v'}·R_0^{s}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofU {
    /// The commitment the issuer signs against.
    #[serde(rename = "U", with = "bignum::dec")]
    pub u: BigUint,
    /// Shared Fiat–Shamir challenge.
    #[serde(with = "bignum::dec")]
    pub c: BigUint,
    /// Response for the blinding share `v'`.
    #[serde(rename = "v_prime_response", with = "bignum::dec")]
    pub v_prime_response: BigUint,
    /// Response for the wallet secret.
    #[serde(rename = "s_response", with = "bignum::dec")]
    pub s_response: BigUint,
}

impl ProofU {
    /// Recompute the commitment from the responses:
    /// `Ũ = S^{v'_r}·R_0^{s_r}·U^{-c}`.
    pub fn reconstruct_commitment(
        &self,
        pk: &PublicKey,
        challenge: &BigUint,
    ) -> Result<BigUint, CryptoError> {
        let mut commit = pk.s.modpow(&self.v_prime_response, &pk.n);
        commit = (commit * pk.base(0)?.modpow(&self.s_response, &pk.n)) % &pk.n;
        let u_c = self.u.modpow(challenge, &pk.n);
        Ok((commit * mod_inv(&u_c, &pk.n, "ProofU commitment")?) % &pk.n)
    }

    /// Merge a keyshare contribution: the keyshare's share of the secret
    /// joins the commitment, its response joins the secret response.
    pub fn merge_proof_p(&mut self, proof_p: &ProofP, pk: &PublicKey) {
        self.u = (&self.u * &proof_p.p) % &pk.n;
        self.s_response += &proof_p.s_response;
    }

    /// Verify as a standalone proof (its own challenge).
    pub fn verify(
        &self,
        pk: &PublicKey,
        context: &BigUint,
        nonce: &BigUint,
    ) -> Result<(), CryptoError> {
        let commit = self.reconstruct_commitment(pk, &self.c)?;
        let expected = proof_list_challenge(context, nonce, &[self.u.clone(), commit]);
        if expected != self.c {
            return Err(CryptoError::ProofVerification(
                "ProofU challenge mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wallet-side builder for [`ProofU`].
pub struct ProofUBuilder {
    pk: PublicKey,
    secret: BigUint,
    v_prime: BigUint,
    u: BigUint,
    s_tilde: BigUint,
    v_prime_tilde: BigUint,
    u_commit: BigUint,
}

impl ProofUBuilder {
    /// Commit to `secret` under `pk`. `s_tilde` is the shared commitment
    /// randomness for the wallet secret.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        pk: &PublicKey,
        secret: &BigUint,
        s_tilde: &BigUint,
    ) -> Result<Self, CryptoError> {
        let v_prime = random_bits(rng, pk.n.bits() + STAT_HIDING_BITS);
        let u = (pk.s.modpow(&v_prime, &pk.n) * pk.base(0)?.modpow(secret, &pk.n)) % &pk.n;
        let v_prime_tilde = random_bits(rng, tilde_bits(pk.n.bits() + STAT_HIDING_BITS));
        let u_commit =
            (pk.s.modpow(&v_prime_tilde, &pk.n) * pk.base(0)?.modpow(s_tilde, &pk.n)) % &pk.n;
        Ok(Self {
            pk: pk.clone(),
            secret: secret.clone(),
            v_prime,
            u,
            s_tilde: s_tilde.clone(),
            v_prime_tilde,
            u_commit,
        })
    }

    /// The wallet's blinding share, added to the issuer's `v` when the
    /// wallet assembles the final signature.
    pub fn v_prime(&self) -> &BigUint {
        &self.v_prime
    }

    /// The commitment value `U`.
    pub fn u(&self) -> &BigUint {
        &self.u
    }
}

impl ProofBuilder for ProofUBuilder {
    fn commitments(&self) -> Vec<BigUint> {
        vec![self.u.clone(), self.u_commit.clone()]
    }

    fn finish(&self, challenge: &BigUint) -> Proof {
        Proof::U(ProofU {
            u: self.u.clone(),
            c: challenge.clone(),
            v_prime_response: &self.v_prime_tilde + challenge * &self.v_prime,
            s_response: &self.s_tilde + challenge * &self.secret,
        })
    }
}

// ---------------------------------------------------------------------------
// ProofD — disclosure
// ---------------------------------------------------------------------------

/// Proof of knowledge of a CL signature over a partially revealed
/// attribute vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofD {
    /// Shared Fiat–Shamir challenge.
    #[serde(with = "bignum::dec")]
    pub c: BigUint,
    /// The randomized signature base `A'`.
    #[serde(rename = "A", with = "bignum::dec")]
    pub a_randomized: BigUint,
    /// Response for the signature exponent `e`.
    #[serde(with = "bignum::dec")]
    pub e_response: BigUint,
    /// Response for the adjusted blinding exponent `v'`.
    #[serde(with = "bignum::dec")]
    pub v_response: BigUint,
    /// Responses for the hidden attributes, keyed by slot.
    #[serde(with = "bignum::dec_map")]
    pub a_responses: BTreeMap<usize, BigUint>,
    /// Revealed attribute integers, keyed by slot.
    #[serde(with = "bignum::dec_map")]
    pub a_disclosed: BTreeMap<usize, BigUint>,
    /// Non-revocation witness, present when the session demands one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonrev: Option<Witness>,
}

impl ProofD {
    /// Recompute the commitment from the responses:
    /// `Z̃ = A'^{e_r}·S^{v_r}·Π_H R_i^{m_{r,i}}·T^{-c}` with
    /// `T = Z·(Π_D R_i^{m_i})^{-1}`.
    pub fn reconstruct_commitment(
        &self,
        pk: &PublicKey,
        challenge: &BigUint,
    ) -> Result<BigUint, CryptoError> {
        let mut disclosed_product = BigUint::from(1u32);
        for (i, m) in &self.a_disclosed {
            disclosed_product = (disclosed_product * pk.base(*i)?.modpow(m, &pk.n)) % &pk.n;
        }
        let t = (&pk.z * mod_inv(&disclosed_product, &pk.n, "disclosed attributes")?) % &pk.n;

        let mut commit = self.a_randomized.modpow(&self.e_response, &pk.n);
        commit = (commit * pk.s.modpow(&self.v_response, &pk.n)) % &pk.n;
        for (i, m_response) in &self.a_responses {
            commit = (commit * pk.base(*i)?.modpow(m_response, &pk.n)) % &pk.n;
        }
        let t_c = t.modpow(challenge, &pk.n);
        Ok((commit * mod_inv(&t_c, &pk.n, "ProofD commitment")?) % &pk.n)
    }

    /// Merge a keyshare contribution into the secret-attribute response.
    pub fn merge_proof_p(&mut self, proof_p: &ProofP, _pk: &PublicKey) {
        if let Some(secret_response) = self.a_responses.get_mut(&0) {
            *secret_response += &proof_p.s_response;
        }
    }

    /// The response covering the wallet secret (attribute slot 0).
    pub fn secret_response(&self) -> Option<&BigUint> {
        self.a_responses.get(&0)
    }

    /// Verify as a standalone proof (its own challenge).
    pub fn verify(
        &self,
        pk: &PublicKey,
        context: &BigUint,
        nonce: &BigUint,
    ) -> Result<(), CryptoError> {
        let commit = self.reconstruct_commitment(pk, &self.c)?;
        let expected =
            proof_list_challenge(context, nonce, &[self.a_randomized.clone(), commit]);
        if expected != self.c {
            return Err(CryptoError::ProofVerification(
                "ProofD challenge mismatch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wallet-side builder for [`ProofD`].
pub struct DisclosureProofBuilder {
    pk: PublicKey,
    randomized: ClSignature,
    attributes: Vec<BigUint>,
    disclosed: BTreeSet<usize>,
    e_tilde: BigUint,
    v_tilde: BigUint,
    a_tildes: BTreeMap<usize, BigUint>,
    z_commit: BigUint,
    nonrev: Option<Witness>,
}

impl DisclosureProofBuilder {
    /// Commit to disclosing `disclosed` slots of a credential's attribute
    /// vector. `s_tilde` is the shared randomness for the secret (slot 0,
    /// never disclosed).
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        pk: &PublicKey,
        signature: &ClSignature,
        attributes: &[BigUint],
        disclosed: &BTreeSet<usize>,
        s_tilde: &BigUint,
        nonrev: Option<Witness>,
    ) -> Result<Self, CryptoError> {
        let randomized = signature.randomize(pk, rng);
        let e_tilde = random_bits(rng, tilde_bits(crate::bignum::EXPONENT_BITS));
        let v_tilde = random_bits(rng, tilde_bits(pk.v_bits()));

        let mut a_tildes = BTreeMap::new();
        for i in 0..attributes.len() {
            if disclosed.contains(&i) {
                continue;
            }
            let tilde = if i == 0 {
                s_tilde.clone()
            } else {
                random_bits(rng, tilde_bits(MESSAGE_BITS))
            };
            a_tildes.insert(i, tilde);
        }

        let mut z_commit = randomized.a.modpow(&e_tilde, &pk.n);
        z_commit = (z_commit * pk.s.modpow(&v_tilde, &pk.n)) % &pk.n;
        for (i, tilde) in &a_tildes {
            z_commit = (z_commit * pk.base(*i)?.modpow(tilde, &pk.n)) % &pk.n;
        }

        Ok(Self {
            pk: pk.clone(),
            randomized,
            attributes: attributes.to_vec(),
            disclosed: disclosed.clone(),
            e_tilde,
            v_tilde,
            a_tildes,
            z_commit,
            nonrev,
        })
    }
}

impl ProofBuilder for DisclosureProofBuilder {
    fn commitments(&self) -> Vec<BigUint> {
        vec![self.randomized.a.clone(), self.z_commit.clone()]
    }

    fn finish(&self, challenge: &BigUint) -> Proof {
        let a_responses = self
            .a_tildes
            .iter()
            .map(|(i, tilde)| (*i, tilde + challenge * &self.attributes[*i]))
            .collect();
        let a_disclosed = self
            .disclosed
            .iter()
            .map(|i| (*i, self.attributes[*i].clone()))
            .collect();
        Proof::D(ProofD {
            c: challenge.clone(),
            a_randomized: self.randomized.a.clone(),
            e_response: &self.e_tilde + challenge * &self.randomized.e,
            v_response: &self.v_tilde + challenge * &self.randomized.v,
            a_responses,
            a_disclosed,
            nonrev: self.nonrev.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// ProofP — keyshare contribution
// ---------------------------------------------------------------------------

/// A keyshare server's proof over its share of the wallet secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofP {
    /// The keyshare's commitment `P = R_0^{s_{ks}}`.
    #[serde(rename = "P", with = "bignum::dec")]
    pub p: BigUint,
    /// The challenge the contribution was computed against.
    #[serde(with = "bignum::dec")]
    pub c: BigUint,
    /// Response for the keyshare's secret share.
    #[serde(with = "bignum::dec")]
    pub s_response: BigUint,
}

// ---------------------------------------------------------------------------
// Proof / ProofList
// ---------------------------------------------------------------------------

/// Either proof kind, as they appear in wallet messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Proof {
    /// A disclosure proof.
    D(ProofD),
    /// An issuance commitment proof.
    U(ProofU),
}

impl Proof {
    /// The shared challenge this proof was produced against.
    pub fn challenge(&self) -> &BigUint {
        match self {
            Proof::D(p) => &p.c,
            Proof::U(p) => &p.c,
        }
    }

    /// The public value and reconstructed commitment, in challenge order.
    pub fn challenge_contribution(
        &self,
        pk: &PublicKey,
        challenge: &BigUint,
    ) -> Result<Vec<BigUint>, CryptoError> {
        match self {
            Proof::D(p) => Ok(vec![
                p.a_randomized.clone(),
                p.reconstruct_commitment(pk, challenge)?,
            ]),
            Proof::U(p) => Ok(vec![p.u.clone(), p.reconstruct_commitment(pk, challenge)?]),
        }
    }

    /// The Schnorr response covering the wallet secret.
    pub fn secret_response(&self) -> Option<&BigUint> {
        match self {
            Proof::D(p) => p.secret_response(),
            Proof::U(p) => Some(&p.s_response),
        }
    }

    /// Merge a keyshare contribution.
    pub fn merge_proof_p(&mut self, proof_p: &ProofP, pk: &PublicKey) {
        match self {
            Proof::D(p) => p.merge_proof_p(proof_p, pk),
            Proof::U(p) => p.merge_proof_p(proof_p, pk),
        }
    }
}

/// An ordered list of proofs sharing one challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofList(pub Vec<Proof>);

impl ProofList {
    /// Build a proof list from builders: one shared challenge over all
    /// commitments, then each builder's responses.
    pub fn from_builders(
        builders: &[&dyn ProofBuilder],
        context: &BigUint,
        nonce: &BigUint,
    ) -> Self {
        let contributions: Vec<BigUint> =
            builders.iter().flat_map(|b| b.commitments()).collect();
        let challenge = proof_list_challenge(context, nonce, &contributions);
        Self(builders.iter().map(|b| b.finish(&challenge)).collect())
    }

    /// Verify the shared challenge across all proofs.
    ///
    /// `pks[i]` is the public key for proof `i`. Checks that every proof
    /// carries the same challenge, that the challenge matches the
    /// reconstructed commitments, and that all proofs bind the same wallet
    /// secret.
    pub fn verify(
        &self,
        pks: &[&PublicKey],
        context: &BigUint,
        nonce: &BigUint,
    ) -> Result<(), CryptoError> {
        if pks.len() != self.0.len() {
            return Err(CryptoError::ProofVerification(format!(
                "have {} proofs but {} public keys",
                self.0.len(),
                pks.len()
            )));
        }
        if self.0.is_empty() {
            return Ok(());
        }

        let challenge = self.0[0].challenge().clone();
        let mut contributions = Vec::with_capacity(self.0.len() * 2);
        for (proof, pk) in self.0.iter().zip(pks) {
            if proof.challenge() != &challenge {
                return Err(CryptoError::ProofVerification(
                    "proofs carry differing challenges".to_string(),
                ));
            }
            contributions.extend(proof.challenge_contribution(pk, &challenge)?);
        }

        let expected = proof_list_challenge(context, nonce, &contributions);
        if expected != challenge {
            return Err(CryptoError::ProofVerification(
                "challenge does not match commitments".to_string(),
            ));
        }

        // All proofs must respond for the same wallet secret.
        let mut secret_responses = self.0.iter().filter_map(Proof::secret_response);
        if let Some(first) = secret_responses.next() {
            if secret_responses.any(|r| r != first) {
                return Err(CryptoError::ProofVerification(
                    "proofs are not bound to the same secret".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Number of proofs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
