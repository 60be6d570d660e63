//! # CL Signatures
//!
//! A Camenisch–Lysyanskaya signature over an attribute integer vector:
//! `(A, e, v)` with `A^e · S^v · Π R_i^{m_i} ≡ Z (mod n)`. Signatures are
//! randomizable — multiplying `A` by `S^r` and compensating in `v` yields
//! an equally valid, unlinkable signature, which is what disclosure proofs
//! are built from.

use num_bigint_dig::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bignum::{self, mod_inv, random_bits};
use crate::error::CryptoError;
use crate::keys::PublicKey;

/// A CL signature `(A, e, v)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClSignature {
    /// The signature base.
    #[serde(rename = "A", with = "bignum::dec")]
    pub a: BigUint,
    /// The prime exponent.
    #[serde(with = "bignum::dec")]
    pub e: BigUint,
    /// The blinding exponent.
    #[serde(with = "bignum::dec")]
    pub v: BigUint,
}

impl ClSignature {
    /// Verify against a full attribute vector (index 0 is the wallet
    /// secret).
    pub fn verify(&self, pk: &PublicKey, attrs: &[BigUint]) -> Result<bool, CryptoError> {
        let mut acc = self.a.modpow(&self.e, &pk.n);
        acc = (acc * pk.s.modpow(&self.v, &pk.n)) % &pk.n;
        for (i, m) in attrs.iter().enumerate() {
            acc = (acc * pk.base(i)?.modpow(m, &pk.n)) % &pk.n;
        }
        Ok(acc == pk.z)
    }

    /// Produce an unlinkable randomization: `A' = A·S^r`, `v' = v − e·r`.
    ///
    /// The randomizer is sized well below `v` so the adjusted blinding
    /// exponent stays positive.
    pub fn randomize<R: Rng + ?Sized>(&self, pk: &PublicKey, rng: &mut R) -> Self {
        let r = random_bits(rng, pk.n.bits() - 256);
        let a = (&self.a * pk.s.modpow(&r, &pk.n)) % &pk.n;
        let v = &self.v - &self.e * &r;
        Self {
            a,
            e: self.e.clone(),
            v,
        }
    }
}

/// Compute the signature base for issuance:
/// `A = (Z / (U · S^v · Π R_i^{m_i}))^{1/e}`, where `U` absorbs the
/// wallet's committed secret and blinding share.
pub(crate) fn sign_commitment(
    pk: &PublicKey,
    group_order: &BigUint,
    u: &BigUint,
    attrs: &[BigUint],
    e: &BigUint,
    v: &BigUint,
) -> Result<BigUint, CryptoError> {
    let mut denom = (u * pk.s.modpow(v, &pk.n)) % &pk.n;
    for (i, m) in attrs.iter().enumerate() {
        denom = (denom * pk.base(i)?.modpow(m, &pk.n)) % &pk.n;
    }
    let q = (&pk.z * mod_inv(&denom, &pk.n, "issuance denominator")?) % &pk.n;
    let e_inv = mod_inv(e, group_order, "signature exponent")?;
    Ok(q.modpow(&e_inv, &pk.n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;
    use rand::rngs::OsRng;

    use crate::bignum::{random_prime, EXPONENT_BITS, MESSAGE_BITS};
    use crate::keys::generate_keypair;

    fn sign_direct(
        pk: &PublicKey,
        order: &BigUint,
        attrs: &[BigUint],
        rng: &mut rand::rngs::OsRng,
    ) -> ClSignature {
        // Direct signing without a commitment: U = 1.
        let e = random_prime(rng, EXPONENT_BITS);
        let v = (BigUint::one() << (pk.v_bits() - 1)) + random_bits(rng, pk.v_bits() - 1);
        let a = sign_commitment(pk, order, &BigUint::one(), attrs, &e, &v).unwrap();
        ClSignature { a, e, v }
    }

    #[test]
    fn sign_then_verify() {
        let (pk, sk) = generate_keypair(&mut OsRng, 512, 4, 0);
        let attrs: Vec<BigUint> = (0..4)
            .map(|_| random_bits(&mut OsRng, MESSAGE_BITS))
            .collect();
        let sig = sign_direct(&pk, &sk.group_order(), &attrs, &mut OsRng);
        assert!(sig.verify(&pk, &attrs).unwrap());
    }

    #[test]
    fn tampered_attribute_fails() {
        let (pk, sk) = generate_keypair(&mut OsRng, 512, 3, 0);
        let mut attrs: Vec<BigUint> = (0..3)
            .map(|_| random_bits(&mut OsRng, MESSAGE_BITS))
            .collect();
        let sig = sign_direct(&pk, &sk.group_order(), &attrs, &mut OsRng);
        attrs[1] += BigUint::one();
        assert!(!sig.verify(&pk, &attrs).unwrap());
    }

    #[test]
    fn randomized_signature_still_verifies() {
        let (pk, sk) = generate_keypair(&mut OsRng, 512, 3, 0);
        let attrs: Vec<BigUint> = (0..3)
            .map(|_| random_bits(&mut OsRng, MESSAGE_BITS))
            .collect();
        let sig = sign_direct(&pk, &sk.group_order(), &attrs, &mut OsRng);
        let rand = sig.randomize(&pk, &mut OsRng);
        assert_ne!(rand.a, sig.a);
        assert!(rand.verify(&pk, &attrs).unwrap());
    }
}
