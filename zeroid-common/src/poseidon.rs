//! circomlib-compatible Poseidon hashing over the BN254 scalar field.
//!
//! The digest produced here MUST match the circomlib reference bit-for-bit:
//! the same hash also runs inside the Circom circuit that produces the proof
//! this service verifies, and any parameter mismatch silently invalidates
//! every credential issued after the mismatch is introduced. `light-poseidon`
//! ships the circomlib round-constant/MDS tables directly (`new_circom`), so
//! no parameters are re-derived here.

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoseidonError {
    #[error("poseidon supports arity 2 or 3, got {0}")]
    UnsupportedArity(usize),
    #[error("light-poseidon hashing failed: {0}")]
    Backend(String),
}

// `Poseidon<Fr>` keeps its round-constant/MDS tables behind `&mut self`
// hashing calls, so each supported arity gets its own lazily-built, mutex-
// guarded hasher rather than reconstructing the tables per call.
static POSEIDON_2: Lazy<Mutex<Poseidon<Fr>>> =
    Lazy::new(|| Mutex::new(Poseidon::<Fr>::new_circom(2).expect("poseidon arity 2 init")));
static POSEIDON_3: Lazy<Mutex<Poseidon<Fr>>> =
    Lazy::new(|| Mutex::new(Poseidon::<Fr>::new_circom(3).expect("poseidon arity 3 init")));

/// Hash 2 or 3 field elements. Arities outside that range are a programmer
/// error in this service (the circuit only ever calls Poseidon-2/3) and are
/// reported rather than panicking, since the inputs ultimately trace back to
/// a request body.
pub fn poseidon(inputs: &[Fr]) -> Result<Fr, PoseidonError> {
    match inputs.len() {
        2 => {
            let mut hasher = POSEIDON_2.lock().expect("poseidon-2 mutex poisoned");
            hasher
                .hash(inputs)
                .map_err(|err| PoseidonError::Backend(err.to_string()))
        }
        3 => {
            let mut hasher = POSEIDON_3.lock().expect("poseidon-3 mutex poisoned");
            hasher
                .hash(inputs)
                .map_err(|err| PoseidonError::Backend(err.to_string()))
        }
        n => Err(PoseidonError::UnsupportedArity(n)),
    }
}

/// Convenience wrapper for the arity-2 case (used for the nullifier:
/// `Poseidon(userSecret, appId)`).
pub fn poseidon2(a: Fr, b: Fr) -> Fr {
    poseidon(&[a, b]).expect("arity 2 is always supported")
}

/// Convenience wrapper for the arity-3 case (used for `credentialHash`:
/// `Poseidon(age, countryCode, userSecret)`).
pub fn poseidon3(a: Fr, b: Fr, c: Fr) -> Fr {
    poseidon(&[a, b, c]).expect("arity 3 is always supported")
}
