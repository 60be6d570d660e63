//! # Issuer-Side Signing
//!
//! Produces CL signatures over a wallet's issuance commitment `U` plus the
//! issuer-chosen attribute integers, together with a proof that the
//! signature base was computed correctly (`A = Q^{1/e}`), bound to the
//! wallet's second nonce.

use num_bigint_dig::BigUint;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::accumulator::Witness;
use crate::bignum::{self, hash_commit, mod_inv, random_bits, random_prime, EXPONENT_BITS};
use crate::error::CryptoError;
use crate::keys::{PrivateKey, PublicKey};
use crate::signature::{sign_commitment, ClSignature};

/// Proof that the issuer computed `A = Q^{1/e}` honestly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofS {
    /// Fiat–Shamir challenge over `(Q, A, commitment, nonce2)`.
    #[serde(with = "bignum::dec")]
    pub c: BigUint,
    /// Schnorr response for `e^{-1}`.
    #[serde(with = "bignum::dec")]
    pub e_response: BigUint,
}

/// The message returned to the wallet for one issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSignature {
    /// The blind CL signature; the wallet adds its own blinding share to `v`.
    pub signature: ClSignature,
    /// Correctness proof for the signature base.
    pub proof_s: ProofS,
    /// Non-revocation witness, for credential types with revocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
}

/// An issuer: a matched key pair ready to sign commitments.
pub struct Issuer<'a> {
    sk: &'a PrivateKey,
    pk: &'a PublicKey,
}

impl<'a> Issuer<'a> {
    /// Pair up issuer keys.
    pub fn new(sk: &'a PrivateKey, pk: &'a PublicKey) -> Self {
        Self { sk, pk }
    }

    /// Sign the commitment `U` over `attributes` (slots `1..`), placing the
    /// optional non-revocation attribute in the slot after them. `nonce2`
    /// binds the correctness proof to the wallet's commitment message.
    pub fn issue_signature<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        u: &BigUint,
        attributes: &[BigUint],
        nonrev_attr: Option<&BigUint>,
        nonce2: &BigUint,
    ) -> Result<IssueSignature, CryptoError> {
        // Slot 0 (the wallet secret) lives inside U; the issuer signs zero
        // there.
        let mut slots = Vec::with_capacity(attributes.len() + 2);
        slots.push(BigUint::from(0u32));
        slots.extend_from_slice(attributes);
        if let Some(nonrev) = nonrev_attr {
            slots.push(nonrev.clone());
        }

        let order = self.sk.group_order();
        let e = random_prime(rng, EXPONENT_BITS);
        let v_bits = self.pk.v_bits();
        let v = (BigUint::one() << (v_bits - 1)) + random_bits(rng, v_bits - 1);
        let a = sign_commitment(self.pk, &order, u, &slots, &e, &v)?;

        let proof_s = self.prove_signature(rng, &a, &e, &order, nonce2)?;

        Ok(IssueSignature {
            signature: ClSignature { a, e, v },
            proof_s,
            witness: None,
        })
    }

    /// Schnorr proof of knowledge of `e^{-1}` such that `A = Q^{1/e}`.
    fn prove_signature<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        a: &BigUint,
        e: &BigUint,
        order: &BigUint,
        nonce2: &BigUint,
    ) -> Result<ProofS, CryptoError> {
        let q = a.modpow(e, &self.pk.n);
        let e_inv = mod_inv(e, order, "signature exponent")?;
        let r = random_bits(rng, order.bits() + 80) % order;
        let commit = q.modpow(&r, &self.pk.n);
        let c = hash_commit(&[&q, a, &commit, nonce2]);
        let e_response = (&r + order - (&c * &e_inv) % order) % order;
        Ok(ProofS { c, e_response })
    }
}

impl ProofS {
    /// Verify against the signature it accompanies.
    pub fn verify(
        &self,
        pk: &PublicKey,
        signature: &ClSignature,
        nonce2: &BigUint,
    ) -> Result<(), CryptoError> {
        let q = signature.a.modpow(&signature.e, &pk.n);
        let commit = (q.modpow(&self.e_response, &pk.n)
            * signature.a.modpow(&self.c, &pk.n))
            % &pk.n;
        let expected = hash_commit(&[&q, &signature.a, &commit, nonce2]);
        if expected != self.c {
            return Err(CryptoError::ProofVerification(
                "ProofS challenge mismatch".to_string(),
            ));
        }
        Ok(())
    }
}
