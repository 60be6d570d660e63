//! # Wallet-Side Credential
//!
//! A credential as held by a wallet: the issuer public key, the completed
//! CL signature, the full attribute vector (secret at slot 0), and the
//! non-revocation witness when the credential type is revocable.
//!
//! The server never holds these; they exist here for the prover arithmetic
//! and the test suite's in-process wallet.

use std::collections::BTreeSet;

use num_bigint_dig::BigUint;
use rand::Rng;

use crate::accumulator::Witness;
use crate::error::CryptoError;
use crate::issuer::IssueSignature;
use crate::keys::PublicKey;
use crate::proofs::DisclosureProofBuilder;
use crate::signature::ClSignature;

/// A credential held by a wallet.
#[derive(Debug, Clone)]
pub struct Credential {
    /// The issuer public key the signature verifies under.
    pub pk: PublicKey,
    /// The completed signature (blinding share added back in).
    pub signature: ClSignature,
    /// Full attribute vector: secret, metadata, named attributes, and the
    /// non-revocation attribute last when present.
    pub attributes: Vec<BigUint>,
    /// Witness against the issuer's revocation accumulator.
    pub witness: Option<Witness>,
}

impl Credential {
    /// Assemble a credential from an issuance response.
    ///
    /// `v_prime` is the blinding share the wallet committed inside `U`;
    /// `attributes` are the issuer-signed slots `1..` (without the secret
    /// and without the non-revocation attribute). The witness's prime
    /// becomes the final attribute slot.
    pub fn from_issuance(
        pk: &PublicKey,
        issued: &IssueSignature,
        secret: &BigUint,
        v_prime: &BigUint,
        attributes: &[BigUint],
        nonce2: &BigUint,
    ) -> Result<Self, CryptoError> {
        issued.proof_s.verify(pk, &issued.signature, nonce2)?;

        let signature = ClSignature {
            a: issued.signature.a.clone(),
            e: issued.signature.e.clone(),
            v: &issued.signature.v + v_prime,
        };

        let mut full = Vec::with_capacity(attributes.len() + 2);
        full.push(secret.clone());
        full.extend_from_slice(attributes);
        if let Some(witness) = &issued.witness {
            full.push(witness.e.clone());
        }

        let credential = Self {
            pk: pk.clone(),
            signature,
            attributes: full,
            witness: issued.witness.clone(),
        };
        if !credential.verify()? {
            return Err(CryptoError::SignatureVerification);
        }
        Ok(credential)
    }

    /// Verify the signature over the full attribute vector.
    pub fn verify(&self) -> Result<bool, CryptoError> {
        self.signature.verify(&self.pk, &self.attributes)
    }

    /// Start a disclosure proof revealing `disclosed` slots. The witness
    /// rides along when the session demands a non-revocation proof.
    pub fn disclosure_builder<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        disclosed: &BTreeSet<usize>,
        s_tilde: &BigUint,
        with_nonrev: bool,
    ) -> Result<DisclosureProofBuilder, CryptoError> {
        DisclosureProofBuilder::new(
            rng,
            &self.pk,
            &self.signature,
            &self.attributes,
            disclosed,
            s_tilde,
            if with_nonrev {
                self.witness.clone()
            } else {
                None
            },
        )
    }
}
