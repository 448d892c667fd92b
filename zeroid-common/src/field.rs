//! Conversions between raw bytes and BN254 scalar-field (`Fr`) elements.
//!
//! Every public signal and every stored field element crosses an untrusted
//! boundary (HTTP JSON, a sled value) as either a big-endian byte string or a
//! decimal string, so the bounds checks here are the only thing standing
//! between a malformed request and a silently-wrapped field element.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use std::str::FromStr;
use thiserror::Error;

/// The BN254 scalar field modulus, as a decimal string, for error messages and tests.
pub const FIELD_MODULUS_DEC: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Same modulus, hex-encoded big-endian, kept around for quick sanity checks.
pub const FIELD_MODULUS_HEX: &str =
    "30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("byte string exceeds the BN254 scalar field modulus")]
    ExceedsModulus,
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("not a valid decimal field element: {0}")]
    InvalidDecimal(String),
}

/// Interpret `bytes` (big-endian, any length) as an `Fr`, reducing modulo `r`
/// if the integer is larger than the field. Used for `userSecret`, which is
/// drawn as 31 random bytes and is always < r by construction, but the
/// reduction is kept general so other 32-byte inputs (e.g. hashes) are safe
/// to funnel through the same path.
pub fn reduce_be_bytes_to_fr(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Strict version: accepts only byte strings whose integer value is already
/// less than the field modulus, refusing to silently wrap. Used for values
/// the wire contract claims are already-reduced field elements (public
/// signals, a `credentialHash`, a nullifier) rather than raw entropy.
pub fn try_be_bytes_to_fr_exact(bytes: &[u8]) -> Result<Fr, FieldError> {
    if bytes.len() > 32 {
        return Err(FieldError::WrongLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let value = BigUint::from_bytes_be(bytes);
    let modulus =
        BigUint::parse_bytes(FIELD_MODULUS_DEC.as_bytes(), 10).expect("modulus constant parses");
    if value >= modulus {
        return Err(FieldError::ExceedsModulus);
    }
    Ok(Fr::from_be_bytes_mod_order(bytes))
}

/// Parse a decimal-string field element, as used on the wire (public
/// signals and credential JSON represent every field element as a decimal
/// string to avoid JSON-number precision loss).
pub fn fr_from_decimal(s: &str) -> Result<Fr, FieldError> {
    let value =
        BigUint::from_str(s).map_err(|_| FieldError::InvalidDecimal(s.to_string()))?;
    let modulus =
        BigUint::parse_bytes(FIELD_MODULUS_DEC.as_bytes(), 10).expect("modulus constant parses");
    if value >= modulus {
        return Err(FieldError::ExceedsModulus);
    }
    Ok(Fr::from(value))
}

/// Render an `Fr` as the decimal string the wire contract expects.
pub fn fr_to_decimal(fr: &Fr) -> String {
    BigUint::from_bytes_be(&fr.into_bigint().to_bytes_be()).to_string()
}

/// Big-endian 32-byte encoding, used for storage keys and hashing inputs.
pub fn fr_to_bytes(fr: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    let be = fr.into_bigint().to_bytes_be();
    out[32 - be.len()..].copy_from_slice(&be);
    out
}

/// Inverse of [`fr_to_bytes`]; reduces rather than rejecting, since callers
/// that already hold a 32-byte array produced by `fr_to_bytes` know it is
/// canonical.
pub fn bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// True when the big-endian byte string, read as an unsigned integer, is
/// greater than or equal to the field modulus.
pub fn bytes_ge_modulus(bytes: &[u8]) -> bool {
    let value = BigUint::from_bytes_be(bytes);
    let modulus =
        BigUint::parse_bytes(FIELD_MODULUS_DEC.as_bytes(), 10).expect("modulus constant parses");
    value >= modulus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_bytes() {
        let fr = Fr::from(424242u64);
        let bytes = fr_to_bytes(&fr);
        assert_eq!(bytes_to_fr(&bytes), fr);
    }

    #[test]
    fn decimal_round_trip() {
        let fr = Fr::from(9001u64);
        let dec = fr_to_decimal(&fr);
        assert_eq!(dec, "9001");
        assert_eq!(fr_from_decimal(&dec).unwrap(), fr);
    }

    #[test]
    fn rejects_value_at_or_above_modulus() {
        assert!(fr_from_decimal(FIELD_MODULUS_DEC).is_err());
        let modulus_bytes = BigUint::parse_bytes(FIELD_MODULUS_DEC.as_bytes(), 10)
            .unwrap()
            .to_bytes_be();
        assert!(bytes_ge_modulus(&modulus_bytes));
    }

    #[test]
    fn invalid_decimal_is_rejected() {
        assert_eq!(
            fr_from_decimal("not-a-number"),
            Err(FieldError::InvalidDecimal("not-a-number".to_string()))
        );
    }

    #[test]
    fn reduction_wraps_oversized_bytes() {
        let oversized = [0xffu8; 40];
        // Must not panic; the reduction path accepts any length.
        let _ = reduce_be_bytes_to_fr(&oversized);
    }
}
