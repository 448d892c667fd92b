//! The nullifier primitive: `Poseidon(userSecret, appId)` (GLOSSARY).
//!
//! This is the single pure function both sides of the system must agree on:
//! the circuit computes it as a public output, and the server recomputes it
//! nowhere (it only ever reads the circuit's public signal at index 5), but
//! the issuance side needs the same formula to answer sybil-uniqueness
//! checks ahead of proof generation, and tests need it to build fixtures.

use crate::poseidon::poseidon2;
use ark_bn254::Fr;

/// `Poseidon(userSecret, appId)` — deterministic, unique per `(userSecret,
/// appId)` pair, and never reveals `userSecret` to a verifier who only holds
/// the nullifier.
pub fn compute_nullifier(user_secret: Fr, app_id: Fr) -> Fr {
    poseidon2(user_secret, app_id)
}
