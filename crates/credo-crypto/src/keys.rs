//! # Issuer Key Material
//!
//! CL issuer keys over an RSA group of two safe primes. The public key
//! carries the modulus `n`, the base `S` generating the quadratic residues,
//! `Z`, and one base `R_i` per signable attribute (plus one spare for the
//! non-revocation attribute). The private key knows the factorisation and
//! therefore the group order.

use num_bigint_dig::BigUint;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::accumulator::{RevocationPrivateKey, RevocationPublicKey};
use crate::bignum::{self, random_bits, safe_prime};
use crate::error::CryptoError;

/// A CL issuer public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// RSA modulus `n = p·q`.
    #[serde(with = "bignum::dec")]
    pub n: BigUint,
    /// Signature target `Z = S^{x_z}`.
    #[serde(with = "bignum::dec")]
    pub z: BigUint,
    /// Quadratic-residue base `S`.
    #[serde(with = "bignum::dec")]
    pub s: BigUint,
    /// Attribute bases `R_0 … R_k`.
    #[serde(with = "bignum::dec_vec")]
    pub r: Vec<BigUint>,
    /// Key rollover counter; referenced by proofs and credential requests.
    pub counter: u32,
}

/// A CL issuer private key: the factorisation of `n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateKey {
    #[serde(with = "bignum::dec")]
    pub(crate) p: BigUint,
    #[serde(with = "bignum::dec")]
    pub(crate) q: BigUint,
    #[serde(with = "bignum::dec")]
    pub(crate) p_prime: BigUint,
    #[serde(with = "bignum::dec")]
    pub(crate) q_prime: BigUint,
    /// Key rollover counter, matching the public key.
    pub counter: u32,
}

impl PrivateKey {
    /// The modulus `n = p·q`.
    pub fn modulus(&self) -> BigUint {
        &self.p * &self.q
    }

    /// The order `p'·q'` of the quadratic-residue subgroup.
    pub fn group_order(&self) -> BigUint {
        &self.p_prime * &self.q_prime
    }

    /// Derive the revocation private key for this issuer key.
    pub fn revocation_key(&self) -> RevocationPrivateKey {
        RevocationPrivateKey::new(self.modulus(), self.group_order())
    }
}

impl PublicKey {
    /// Number of attribute slots (including the secret at index 0).
    pub fn attribute_count(&self) -> usize {
        self.r.len()
    }

    /// The attribute base for slot `i`.
    pub fn base(&self, i: usize) -> Result<&BigUint, CryptoError> {
        self.r.get(i).ok_or_else(|| {
            CryptoError::InvalidKey(format!("no attribute base {i} (key has {})", self.r.len()))
        })
    }

    /// Bit size of signature randomness `v`.
    pub fn v_bits(&self) -> usize {
        self.n.bits() + 128
    }

    /// Derive the revocation public key for this issuer key.
    pub fn revocation_key(&self) -> RevocationPublicKey {
        RevocationPublicKey::new(self.n.clone())
    }
}

/// Generate a fresh issuer keypair.
///
/// `modulus_bits` is the size of `n`; `attributes` is the number of
/// signable slots, including the wallet secret at index 0 and the
/// non-revocation slot at the end.
pub fn generate_keypair<R: Rng + ?Sized>(
    rng: &mut R,
    modulus_bits: usize,
    attributes: usize,
    counter: u32,
) -> (PublicKey, PrivateKey) {
    let p = safe_prime(rng, modulus_bits / 2);
    let q = loop {
        let q = safe_prime(rng, modulus_bits / 2);
        if q != p {
            break q;
        }
    };
    let one = BigUint::one();
    let p_prime: BigUint = (&p - &one) >> 1usize;
    let q_prime: BigUint = (&q - &one) >> 1usize;
    let n = &p * &q;
    let order = &p_prime * &q_prime;

    // S generates (with overwhelming probability) the QR subgroup.
    let s = random_qr(rng, &n);
    let z = s.modpow(&random_exponent(rng, &order), &n);
    let r = (0..attributes)
        .map(|_| s.modpow(&random_exponent(rng, &order), &n))
        .collect();

    (
        PublicKey {
            n,
            z,
            s,
            r,
            counter,
        },
        PrivateKey {
            p,
            q,
            p_prime,
            q_prime,
            counter,
        },
    )
}

/// A random quadratic residue mod `n`.
fn random_qr<R: Rng + ?Sized>(rng: &mut R, n: &BigUint) -> BigUint {
    let x = random_bits(rng, n.bits() - 1);
    (&x * &x) % n
}

/// A random exponent in `[2, order)`.
fn random_exponent<R: Rng + ?Sized>(rng: &mut R, order: &BigUint) -> BigUint {
    let two = BigUint::from(2u32);
    loop {
        let x = random_bits(rng, order.bits());
        if x >= two && &x < order {
            return x;
        }
    }
}
