//! # Bignum Helpers
//!
//! Shared big-integer plumbing: system parameter sizes, the Fiat–Shamir
//! commitment hash, random sampling, signed modular exponentiation, and
//! serde adapters rendering big integers as decimal strings on the wire.

use num_bigint_dig::{BigInt, BigUint, ModInverse, RandBigInt, RandPrime, Sign};
use num_traits::One;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Bit size of attribute integers (the message space).
pub const MESSAGE_BITS: usize = 256;
/// Bit size of CL signature exponents `e`.
pub const EXPONENT_BITS: usize = 120;
/// Bit size of Fiat–Shamir challenges.
pub const CHALLENGE_BITS: usize = 256;
/// Statistical hiding slack for Schnorr commitment randomness.
pub const STAT_HIDING_BITS: usize = 80;
/// Bit size of accumulator witness primes.
pub const ACCUMULATOR_PRIME_BITS: usize = 120;

/// Commitment randomness size for a witness of `value_bits` bits: enough to
/// statistically hide `value + challenge * value`.
pub const fn tilde_bits(value_bits: usize) -> usize {
    value_bits + CHALLENGE_BITS + STAT_HIDING_BITS
}

/// The Fiat–Shamir commitment hash: SHA-256 over the length-prefixed
/// big-endian encodings of `values`, in order, interpreted as an integer.
pub fn hash_commit(values: &[&BigUint]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update((values.len() as u32).to_be_bytes());
    for v in values {
        let bytes = v.to_bytes_be();
        hasher.update((bytes.len() as u32).to_be_bytes());
        hasher.update(&bytes);
    }
    BigUint::from_bytes_be(&hasher.finalize())
}

/// Sample a uniform integer of at most `bits` bits.
pub fn random_bits<R: Rng + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    rng.gen_biguint(bits)
}

/// Sample a probable prime of exactly `bits` bits.
pub fn random_prime<R: Rng + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    rng.gen_prime(bits)
}

/// Sample a safe prime `p = 2q + 1` of exactly `bits` bits.
pub fn safe_prime<R: Rng + ?Sized>(rng: &mut R, bits: usize) -> BigUint {
    loop {
        let q = rng.gen_prime(bits - 1);
        let p: BigUint = (&q << 1usize) + BigUint::one();
        if num_bigint_dig::prime::probably_prime(&p, 20) {
            return p;
        }
    }
}

/// Modular inverse of `a` mod `n`, failing when none exists.
pub fn mod_inv(a: &BigUint, n: &BigUint, context: &'static str) -> Result<BigUint, CryptoError> {
    a.mod_inverse(n)
        .and_then(|i| i.to_biguint())
        .ok_or(CryptoError::NoInverse { context })
}

/// `base^exp mod n` for a signed exponent: negative exponents invert the
/// base first.
pub fn pow_signed(base: &BigUint, exp: &BigInt, n: &BigUint) -> Result<BigUint, CryptoError> {
    match exp.sign() {
        Sign::NoSign => Ok(BigUint::one()),
        Sign::Plus => {
            let e = exp.to_biguint().ok_or(CryptoError::NoInverse {
                context: "signed exponent",
            })?;
            Ok(base.modpow(&e, n))
        }
        Sign::Minus => {
            let e = (-exp).to_biguint().ok_or(CryptoError::NoInverse {
                context: "signed exponent",
            })?;
            let inv = mod_inv(base, n, "signed exponent base")?;
            Ok(inv.modpow(&e, n))
        }
    }
}

/// Serde adapter: `BigUint` as a decimal string.
pub mod dec {
    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let s = String::deserialize(deserializer)?;
        BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal integer {s:?}")))
    }
}

/// Serde adapter: `Option<BigUint>` as an optional decimal string.
pub mod dec_opt {
    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        v: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        v.as_ref().map(|b| b.to_str_radix(10)).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| {
            BigUint::parse_bytes(s.as_bytes(), 10)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid decimal integer {s:?}")))
        })
        .transpose()
    }
}

/// Serde adapter: `Vec<BigUint>` as decimal strings.
pub mod dec_vec {
    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[BigUint], serializer: S) -> Result<S::Ok, S::Error> {
        v.iter()
            .map(|b| b.to_str_radix(10))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        let strings: Vec<String> = Vec::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| {
                BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid decimal integer {s:?}"))
                })
            })
            .collect()
    }
}

/// Serde adapter: `BTreeMap<usize, BigUint>` as a JSON object with string
/// keys and decimal string values. String keys keep the map parseable when
/// the containing type sits inside an untagged enum (whose buffered form
/// only knows string map keys).
pub mod dec_map {
    use std::collections::BTreeMap;

    use num_bigint_dig::BigUint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        v: &BTreeMap<usize, BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        v.iter()
            .map(|(k, b)| (k.to_string(), b.to_str_radix(10)))
            .collect::<BTreeMap<String, String>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<usize, BigUint>, D::Error> {
        let strings: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|(k, s)| {
                let slot: usize = k
                    .parse()
                    .map_err(|_| serde::de::Error::custom(format!("invalid slot key {k:?}")))?;
                BigUint::parse_bytes(s.as_bytes(), 10)
                    .map(|b| (slot, b))
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!("invalid decimal integer {s:?}"))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;
    use rand::rngs::OsRng;

    #[test]
    fn hash_commit_is_deterministic_and_order_sensitive() {
        let a = BigUint::from_u64(7).unwrap();
        let b = BigUint::from_u64(11).unwrap();
        assert_eq!(hash_commit(&[&a, &b]), hash_commit(&[&a, &b]));
        assert_ne!(hash_commit(&[&a, &b]), hash_commit(&[&b, &a]));
    }

    #[test]
    fn hash_commit_distinguishes_concatenation() {
        // [1, 23] and [12, 3] must hash differently.
        let a = BigUint::parse_bytes(b"1", 10).unwrap();
        let b = BigUint::parse_bytes(b"23", 10).unwrap();
        let c = BigUint::parse_bytes(b"12", 10).unwrap();
        let d = BigUint::parse_bytes(b"3", 10).unwrap();
        assert_ne!(hash_commit(&[&a, &b]), hash_commit(&[&c, &d]));
    }

    #[test]
    fn safe_prime_has_prime_half() {
        let p = safe_prime(&mut OsRng, 64);
        assert_eq!(p.bits(), 64);
        let q: BigUint = (&p - BigUint::one()) >> 1usize;
        assert!(num_bigint_dig::prime::probably_prime(&q, 20));
    }

    #[test]
    fn mod_inv_roundtrip() {
        let n = BigUint::from_u64(101).unwrap();
        let a = BigUint::from_u64(37).unwrap();
        let inv = mod_inv(&a, &n, "test").unwrap();
        assert_eq!((a * inv) % n, BigUint::one());
    }

    #[test]
    fn pow_signed_negative_exponent() {
        let n = BigUint::from_u64(101).unwrap();
        let base = BigUint::from_u64(5).unwrap();
        let exp = BigInt::from_i64(-3).unwrap();
        let got = pow_signed(&base, &exp, &n).unwrap();
        // got * 5^3 == 1 mod 101
        let cube = base.modpow(&BigUint::from_u64(3).unwrap(), &n);
        assert_eq!((got * cube) % n, BigUint::one());
    }

    #[test]
    fn dec_serde_roundtrip() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct W(#[serde(with = "super::dec")] BigUint);
        let w = W(BigUint::parse_bytes(b"123456789012345678901234567890", 10).unwrap());
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, "\"123456789012345678901234567890\"");
        let back: W = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, w.0);
    }
}
