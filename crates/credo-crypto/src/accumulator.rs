//! # RSA-B Revocation Accumulator
//!
//! The accumulator is a single group element `ν` mod `n`. A credential's
//! non-revocation witness is a pair `(u, e)` with `e` prime and
//! `u^e ≡ ν (mod n)`. Revoking `e` replaces the accumulator with
//! `ν^(1/e)`: every remaining witness holder can follow using Bézout
//! coefficients, while the revoked prime cannot (its witness update would
//! require an `e`-th root, which only the key holder can take).
//!
//! The issuer's revocation key is the group order, derived from the CL
//! issuer private key; knowing the order is what permits taking roots.

use num_bigint_dig::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bignum::{self, mod_inv, pow_signed, random_bits, random_prime, ACCUMULATOR_PRIME_BITS};
use crate::error::CryptoError;

/// Private revocation key: modulus plus group order.
#[derive(Debug, Clone)]
pub struct RevocationPrivateKey {
    n: BigUint,
    order: BigUint,
}

/// Public revocation key: the modulus alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationPublicKey {
    #[serde(with = "bignum::dec")]
    n: BigUint,
}

impl RevocationPrivateKey {
    /// Assemble from modulus and group order.
    pub fn new(n: BigUint, order: BigUint) -> Self {
        Self { n, order }
    }

    /// The modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// `base^(1/e)` mod `n` — an `e`-th root, computable only with the
    /// group order.
    fn root(&self, base: &BigUint, e: &BigUint) -> Result<BigUint, CryptoError> {
        let e_inv = mod_inv(e, &self.order, "accumulator exponent")?;
        Ok(base.modpow(&e_inv, &self.n))
    }
}

impl RevocationPublicKey {
    /// Assemble from the modulus.
    pub fn new(n: BigUint) -> Self {
        Self { n }
    }

    /// The modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }
}

/// The accumulator state at one point of the revocation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    /// The accumulated value `ν`.
    #[serde(with = "bignum::dec")]
    pub nu: BigUint,
    /// Position in the revocation log; starts at 1.
    pub index: u64,
}

impl Accumulator {
    /// Create the initial accumulator (log index 1) from fresh randomness.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R, sk: &RevocationPrivateKey) -> Self {
        let x = random_bits(rng, sk.n.bits() - 1);
        Self {
            nu: (&x * &x) % &sk.n,
            index: 1,
        }
    }

    /// Remove prime `e` from the accumulator: `ν ← ν^(1/e)`, advancing the
    /// index.
    pub fn remove(&self, sk: &RevocationPrivateKey, e: &BigUint) -> Result<Self, CryptoError> {
        Ok(Self {
            nu: sk.root(&self.nu, e)?,
            index: self.index + 1,
        })
    }

    /// Record an event that leaves the value untouched (an issuance),
    /// advancing the index.
    pub fn advance(&self) -> Self {
        Self {
            nu: self.nu.clone(),
            index: self.index + 1,
        }
    }
}

/// A non-revocation witness: `u^e ≡ ν (mod n)` for the current `ν`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    /// The witness base.
    #[serde(with = "bignum::dec")]
    pub u: BigUint,
    /// The credential's prime, doubling as its non-revocation attribute.
    #[serde(with = "bignum::dec")]
    pub e: BigUint,
    /// Index of the accumulator this witness is valid against.
    pub accumulator_index: u64,
}

impl Witness {
    /// Generate a fresh witness under the issuer's revocation key: a new
    /// prime `e` and `u = ν^(1/e)`.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        sk: &RevocationPrivateKey,
        acc: &Accumulator,
    ) -> Result<Self, CryptoError> {
        let e = random_prime(rng, ACCUMULATOR_PRIME_BITS);
        let u = sk.root(&acc.nu, &e)?;
        Ok(Self {
            u,
            e,
            accumulator_index: acc.index,
        })
    }

    /// Verify this witness against an accumulator value.
    pub fn verify(&self, pk: &RevocationPublicKey, acc: &Accumulator) -> bool {
        self.u.modpow(&self.e, &pk.n) == acc.nu
    }

    /// Follow a revocation without the private key.
    ///
    /// With `a·e + b·e' = 1` (Bézout), the updated base is
    /// `u' = u^b · ν'^a`, which satisfies `u'^e ≡ ν'`. Fails with
    /// [`CryptoError::WitnessRevoked`] when `e = e'` — the holder's own
    /// prime was removed and no coefficients exist.
    pub fn update(
        &mut self,
        pk: &RevocationPublicKey,
        revoked_e: &BigUint,
        new_acc: &Accumulator,
    ) -> Result<(), CryptoError> {
        let e = BigInt::from(self.e.clone());
        let e_rev = BigInt::from(revoked_e.clone());
        let gcd = e.extended_gcd(&e_rev);
        if gcd.gcd != BigInt::one() {
            return Err(CryptoError::WitnessRevoked);
        }
        // gcd = x·e + y·e', so u' = ν'^x · u^y satisfies u'^e ≡ ν'.
        let nu_x = pow_signed(&new_acc.nu, &gcd.x, &pk.n)?;
        let u_y = pow_signed(&self.u, &gcd.y, &pk.n)?;
        self.u = (nu_x * u_y) % &pk.n;
        self.accumulator_index = new_acc.index;
        Ok(())
    }
}

/// What a revocation record did to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A credential was issued; the accumulator value is unchanged.
    Issue,
    /// A prime was removed from the accumulator.
    Revoke,
}

/// One entry of a credential type's revocation log.
///
/// Records chain: a `Revoke` record's accumulator must be the `e`-th root
/// of its predecessor's, an `Issue` record must leave the value unchanged.
/// This makes each record independently verifiable against its
/// predecessor without a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// The accumulator state after this event; its index is the record's
    /// position in the log.
    pub accumulator: Accumulator,
    /// What happened.
    pub event: EventKind,
    /// The event's witness prime. For the genesis record this is 1.
    #[serde(with = "bignum::dec")]
    pub e: BigUint,
}

impl RevocationRecord {
    /// The genesis record (index 1) created when revocation is enabled.
    pub fn genesis(accumulator: Accumulator) -> Self {
        Self {
            accumulator,
            event: EventKind::Issue,
            e: BigUint::one(),
        }
    }

    /// Position in the revocation log.
    pub fn index(&self) -> u64 {
        self.accumulator.index
    }

    /// Verify this record against its predecessor.
    pub fn verify_against(&self, pk: &RevocationPublicKey, prev: &Self) -> bool {
        if self.index() != prev.index() + 1 {
            return false;
        }
        match self.event {
            EventKind::Issue => self.accumulator.nu == prev.accumulator.nu,
            EventKind::Revoke => {
                self.accumulator.nu.modpow(&self.e, &pk.n) == prev.accumulator.nu
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    use crate::keys::generate_keypair;

    fn revocation_keys() -> (RevocationPublicKey, RevocationPrivateKey) {
        let (pk, sk) = generate_keypair(&mut OsRng, 512, 2, 0);
        (pk.revocation_key(), sk.revocation_key())
    }

    #[test]
    fn fresh_witness_verifies() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        assert_eq!(acc.index, 1);
        let w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        assert!(w.verify(&pk, &acc));
        assert_eq!(w.accumulator_index, 1);
    }

    #[test]
    fn remove_invalidates_stale_witness() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let other = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let acc2 = acc.remove(&sk, &other.e).unwrap();
        assert_eq!(acc2.index, 2);
        assert!(!w.verify(&pk, &acc2));
    }

    #[test]
    fn witness_update_follows_revocation() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let mut w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let other = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let acc2 = acc.remove(&sk, &other.e).unwrap();
        w.update(&pk, &other.e, &acc2).unwrap();
        assert!(w.verify(&pk, &acc2));
        assert_eq!(w.accumulator_index, 2);
    }

    #[test]
    fn own_revocation_blocks_update() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let mut w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let acc2 = acc.remove(&sk, &w.e.clone()).unwrap();
        let err = w.update(&pk, &w.e.clone(), &acc2).unwrap_err();
        assert!(matches!(err, CryptoError::WitnessRevoked));
    }

    #[test]
    fn remove_is_verifiable_by_exponentiation() {
        // A revocation record's accumulator chain check: prev == new^e.
        let (_, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let acc2 = acc.remove(&sk, &w.e).unwrap();
        assert_eq!(acc2.nu.modpow(&w.e, sk.modulus()), acc.nu);
    }

    #[test]
    fn advance_keeps_value() {
        let (_, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let acc2 = acc.advance();
        assert_eq!(acc2.nu, acc.nu);
        assert_eq!(acc2.index, 2);
    }

    #[test]
    fn record_chain_verifies() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let genesis = RevocationRecord::genesis(acc.clone());

        let w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let issue = RevocationRecord {
            accumulator: acc.advance(),
            event: EventKind::Issue,
            e: w.e.clone(),
        };
        assert!(issue.verify_against(&pk, &genesis));

        let acc3 = issue.accumulator.remove(&sk, &w.e).unwrap();
        let revoke = RevocationRecord {
            accumulator: acc3,
            event: EventKind::Revoke,
            e: w.e.clone(),
        };
        assert!(revoke.verify_against(&pk, &issue));
        assert!(!revoke.verify_against(&pk, &genesis));
    }

    #[test]
    fn record_chain_rejects_tampered_value() {
        let (pk, sk) = revocation_keys();
        let acc = Accumulator::initial(&mut OsRng, &sk);
        let genesis = RevocationRecord::genesis(acc.clone());
        let w = Witness::generate(&mut OsRng, &sk, &acc).unwrap();
        let mut revoke = RevocationRecord {
            accumulator: acc.remove(&sk, &w.e).unwrap(),
            event: EventKind::Revoke,
            e: w.e.clone(),
        };
        revoke.accumulator.nu += BigUint::one();
        assert!(!revoke.verify_against(&pk, &genesis));
    }
}
