//! EdDSA over the BabyJubJub twisted Edwards curve with a Poseidon
//! message/challenge hash, matching the scheme the credential issuer and the
//! proof-verifying circuit must agree on (§4.1).
//!
//! `ark-ed-on-bn254::EdwardsProjective` is BabyJubJub: a twisted Edwards
//! curve whose base field is the BN254 scalar field (so a BabyJubJub point's
//! coordinates are themselves valid `ark_bn254::Fr` elements, matching the
//! wire contract's "point as two field elements"). Its own scalar field
//! (`EdwardsScalarField`) is a separate, smaller prime — the subgroup order —
//! used for private scalars and signature arithmetic.
//!
//! The challenge hash folds `(R8, pubKey, msg)` through the arity-2/3
//! Poseidon exposed by [`crate::poseidon`] rather than introducing a wider
//! arity, since §4.1 only commits to arities 2 and 3 as the cross-circuit
//! contract.

use crate::field::fr_to_bytes;
use crate::poseidon::{poseidon2, poseidon3};
use ark_bn254::Fr as BaseField;
use ark_ec::{CurveGroup, Group};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsProjective, Fr as ScalarField};
use ark_ff::PrimeField;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EddsaError {
    #[error("private key must be exactly 32 bytes, got {0}")]
    BadPrivateKeyLength(usize),
}

/// A BabyJubJub point, represented the way the wire contract expects: two
/// base-field elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: BaseField,
    pub y: BaseField,
}

impl From<EdwardsAffine> for Point {
    fn from(p: EdwardsAffine) -> Self {
        Point { x: p.x, y: p.y }
    }
}

impl Point {
    fn to_affine(self) -> EdwardsAffine {
        EdwardsAffine::new_unchecked(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r8: Point,
    pub s: ScalarField,
}

/// Raw private key bytes plus the derived signing scalar, kept together so
/// callers never need to re-derive the scalar (and so the scalar, not the
/// raw seed, is what participates in curve arithmetic).
#[derive(Clone)]
pub struct PrivateKey {
    seed: [u8; 32],
    scalar: ScalarField,
}

impl PrivateKey {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let scalar = derive_scalar(&seed);
        Self { seed, scalar }
    }

    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    pub fn seed_bytes(&self) -> [u8; 32] {
        self.seed
    }

    pub fn from_seed_hex(hex_str: &str) -> Result<Self, EddsaError> {
        let bytes = hex::decode(hex_str).map_err(|_| EddsaError::BadPrivateKeyLength(0))?;
        if bytes.len() != 32 {
            return Err(EddsaError::BadPrivateKeyLength(bytes.len()));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self::from_seed(seed))
    }

    pub fn public_key(&self) -> Point {
        (EdwardsProjective::generator() * self.scalar)
            .into_affine()
            .into()
    }
}

fn derive_scalar(seed: &[u8; 32]) -> ScalarField {
    let digest = Sha256::digest(seed);
    ScalarField::from_be_bytes_mod_order(&digest)
}

fn derive_nonce(seed: &[u8; 32], msg: BaseField) -> ScalarField {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(b"zeroid-eddsa-nonce");
    hasher.update(fr_to_bytes(&msg));
    let digest = hasher.finalize();
    ScalarField::from_be_bytes_mod_order(&digest)
}

/// Folds `(R8, pubKey, msg)` into a single base-field challenge, then
/// reduces it into the curve's scalar field for use in the signature
/// equation.
fn challenge_scalar(r8: Point, pubkey: Point, msg: BaseField) -> ScalarField {
    let r8_digest = poseidon2(r8.x, r8.y);
    let pk_digest = poseidon3(r8_digest, pubkey.x, pubkey.y);
    let hram = poseidon2(pk_digest, msg);
    ScalarField::from_be_bytes_mod_order(&fr_to_bytes(&hram))
}

pub fn eddsa_generate(rng: &mut (impl RngCore + CryptoRng)) -> (PrivateKey, Point) {
    let sk = PrivateKey::generate(rng);
    let pk = sk.public_key();
    (sk, pk)
}

pub fn eddsa_sign_poseidon(sk: &PrivateKey, msg: BaseField) -> Signature {
    let pubkey = sk.public_key();
    let r = derive_nonce(&sk.seed, msg);
    let r8: Point = (EdwardsProjective::generator() * r).into_affine().into();
    let hram = challenge_scalar(r8, pubkey, msg);
    let s = r + hram * sk.scalar;
    Signature { r8, s }
}

pub fn eddsa_verify_poseidon(pubkey: Point, msg: BaseField, sig: Signature) -> bool {
    let hram = challenge_scalar(sig.r8, pubkey, msg);
    let lhs = EdwardsProjective::generator() * sig.s;
    let rhs = sig.r8.to_affine() + pubkey.to_affine() * hram;
    lhs.into_affine() == rhs.into_affine()
}

/// Big-endian byte encoding of a scalar-field element, for the wire's
/// "field scalar" representation of `S`. The BabyJubJub subgroup order is
/// smaller than the BN254 `Fr` modulus, so every encoded `S` is also a valid
/// decimal `Fr` value, matching the credential JSON's uniform
/// decimal-string-for-every-field-element convention.
pub fn scalar_to_bytes(s: &ScalarField) -> [u8; 32] {
    let mut out = [0u8; 32];
    let be = s.into_bigint().to_bytes_be();
    out[32 - be.len()..].copy_from_slice(&be);
    out
}

pub fn bytes_to_scalar(bytes: &[u8]) -> ScalarField {
    ScalarField::from_be_bytes_mod_order(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_then_verify_round_trips() {
        let mut rng = OsRng;
        let (sk, pk) = eddsa_generate(&mut rng);
        let msg = BaseField::from(123456789u64);
        let sig = eddsa_sign_poseidon(&sk, msg);
        assert!(eddsa_verify_poseidon(pk, msg, sig));
    }

    #[test]
    fn verify_fails_for_wrong_message() {
        let mut rng = OsRng;
        let (sk, pk) = eddsa_generate(&mut rng);
        let sig = eddsa_sign_poseidon(&sk, BaseField::from(1u64));
        assert!(!eddsa_verify_poseidon(pk, BaseField::from(2u64), sig));
    }

    #[test]
    fn verify_fails_under_wrong_key() {
        let mut rng = OsRng;
        let (sk_a, _pk_a) = eddsa_generate(&mut rng);
        let (_sk_b, pk_b) = eddsa_generate(&mut rng);
        let msg = BaseField::from(42u64);
        let sig = eddsa_sign_poseidon(&sk_a, msg);
        assert!(!eddsa_verify_poseidon(pk_b, msg, sig));
    }

    #[test]
    fn many_random_messages_round_trip() {
        let mut rng = OsRng;
        let (sk, pk) = eddsa_generate(&mut rng);
        for i in 0..200u64 {
            let msg = BaseField::from(i * 7919 + 1);
            let sig = eddsa_sign_poseidon(&sk, msg);
            assert!(eddsa_verify_poseidon(pk, msg, sig));
        }
    }

    #[test]
    fn from_seed_hex_round_trips_public_key() {
        let seed = [7u8; 32];
        let sk1 = PrivateKey::from_seed(seed);
        let sk2 = PrivateKey::from_seed_hex(&hex::encode(seed)).unwrap();
        assert_eq!(sk1.public_key(), sk2.public_key());
    }

    #[test]
    fn rejects_malformed_hex_seed() {
        assert!(PrivateKey::from_seed_hex("abcd").is_err());
    }
}
