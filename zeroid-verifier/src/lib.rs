//! Groth16 proof verification over BN254 (§4.6).
//!
//! This crate knows nothing about HTTP, caching, or nullifiers — it is the
//! thin, pure boundary between the snarkjs-shaped JSON a client submits and
//! `ark-groth16`'s typed `Proof`/`VerifyingKey`. The circuit and trusted
//! setup that produced those artifacts are out of scope (§1); this crate
//! only has to parse them correctly and check the pairing equation.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ff::PrimeField;
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_snark::SNARK;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use zeroid_common::artifacts::{load_artifact_bytes, ArtifactError};

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("not a valid base-field decimal: {0}")]
    InvalidFieldElement(String),
    #[error("malformed G1 point")]
    MalformedG1,
    #[error("malformed G2 point")]
    MalformedG2,
    #[error("failed to parse verification key JSON: {0}")]
    InvalidVerifyingKeyJson(String),
    #[error("failed to parse proof JSON: {0}")]
    InvalidProofJson(String),
    #[error("verification key artifact unreadable: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("public input count ({got}) does not match the loaded verification key ({expected})")]
    PublicInputCountMismatch { expected: usize, got: usize },
}

fn fq_from_decimal(s: &str) -> Result<Fq, VerifierError> {
    let value =
        BigUint::from_str(s).map_err(|_| VerifierError::InvalidFieldElement(s.to_string()))?;
    Ok(Fq::from(value))
}

fn fq_to_decimal(f: &Fq) -> String {
    BigUint::from_bytes_be(&f.into_bigint().to_bytes_be()).to_string()
}

/// A G1 point in the `[x, y, z]` decimal-string triple snarkjs emits.
/// `z` is always `"1"` for an affine point and is not carried in
/// [`G1Affine`]; it is still accepted on the way in and re-emitted on the
/// way out so round-tripping through JSON is lossless.
pub type G1Triple = [String; 3];
/// A G2 point: two base-field components per coordinate, snarkjs's
/// `[[x0,x1],[y0,y1],[1,0]]` shape.
pub type G2Triple = [[String; 2]; 3];

fn g1_from_triple(p: &G1Triple) -> Result<G1Affine, VerifierError> {
    let x = fq_from_decimal(&p[0]).map_err(|_| VerifierError::MalformedG1)?;
    let y = fq_from_decimal(&p[1]).map_err(|_| VerifierError::MalformedG1)?;
    Ok(G1Affine::new_unchecked(x, y))
}

fn g1_to_triple(p: &G1Affine) -> G1Triple {
    [fq_to_decimal(&p.x), fq_to_decimal(&p.y), "1".to_string()]
}

fn g2_from_triple(p: &G2Triple) -> Result<G2Affine, VerifierError> {
    let x0 = fq_from_decimal(&p[0][0]).map_err(|_| VerifierError::MalformedG2)?;
    let x1 = fq_from_decimal(&p[0][1]).map_err(|_| VerifierError::MalformedG2)?;
    let y0 = fq_from_decimal(&p[1][0]).map_err(|_| VerifierError::MalformedG2)?;
    let y1 = fq_from_decimal(&p[1][1]).map_err(|_| VerifierError::MalformedG2)?;
    Ok(G2Affine::new_unchecked(Fq2::new(x0, x1), Fq2::new(y0, y1)))
}

fn g2_to_triple(p: &G2Affine) -> G2Triple {
    [
        [fq_to_decimal(&p.x.c0), fq_to_decimal(&p.x.c1)],
        [fq_to_decimal(&p.y.c0), fq_to_decimal(&p.y.c1)],
        ["1".to_string(), "0".to_string()],
    ]
}

/// The wire shape of a Groth16 proof, matching the snarkjs `proof.json`
/// layout (`pi_a`/`pi_b`/`pi_c`) that the browser proving widget produces
/// (out of scope per §1; this is only the shape it hands us).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofJson {
    pub pi_a: G1Triple,
    pub pi_b: G2Triple,
    pub pi_c: G1Triple,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
}

fn default_protocol() -> String {
    "groth16".to_string()
}

fn default_curve() -> String {
    "bn128".to_string()
}

impl ProofJson {
    pub fn to_proof(&self) -> Result<Proof<Bn254>, VerifierError> {
        Ok(Proof {
            a: g1_from_triple(&self.pi_a)?,
            b: g2_from_triple(&self.pi_b)?,
            c: g1_from_triple(&self.pi_c)?,
        })
    }

    pub fn from_proof(proof: &Proof<Bn254>) -> Self {
        ProofJson {
            pi_a: g1_to_triple(&proof.a),
            pi_b: g2_to_triple(&proof.b),
            pi_c: g1_to_triple(&proof.c),
            protocol: default_protocol(),
            curve: default_curve(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, VerifierError> {
        serde_json::from_str(s).map_err(|e| VerifierError::InvalidProofJson(e.to_string()))
    }
}

/// The wire shape of a Groth16 verification key, matching snarkjs's
/// `verification_key.json` (§1: consumed as an opaque artifact produced by
/// the out-of-scope trusted-setup ceremony).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerifyingKeyJson {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: G1Triple,
    pub vk_beta_2: G2Triple,
    pub vk_gamma_2: G2Triple,
    pub vk_delta_2: G2Triple,
    #[serde(rename = "IC")]
    pub ic: Vec<G1Triple>,
}

impl VerifyingKeyJson {
    pub fn to_verifying_key(&self) -> Result<VerifyingKey<Bn254>, VerifierError> {
        let gamma_abc_g1 = self
            .ic
            .iter()
            .map(g1_from_triple)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VerifyingKey {
            alpha_g1: g1_from_triple(&self.vk_alpha_1)?,
            beta_g2: g2_from_triple(&self.vk_beta_2)?,
            gamma_g2: g2_from_triple(&self.vk_gamma_2)?,
            delta_g2: g2_from_triple(&self.vk_delta_2)?,
            gamma_abc_g1,
        })
    }

    pub fn from_verifying_key(vk: &VerifyingKey<Bn254>) -> Self {
        VerifyingKeyJson {
            protocol: default_protocol(),
            curve: default_curve(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_to_triple(&vk.alpha_g1),
            vk_beta_2: g2_to_triple(&vk.beta_g2),
            vk_gamma_2: g2_to_triple(&vk.gamma_g2),
            vk_delta_2: g2_to_triple(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_to_triple).collect(),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, VerifierError> {
        serde_json::from_str(s).map_err(|e| VerifierError::InvalidVerifyingKeyJson(e.to_string()))
    }
}

/// A loaded, ready-to-use verification key: the typed `ark-groth16` key plus
/// its pairing-prepared form, since every verification re-prepares it
/// otherwise (one of the two fixed Miller-loop-independent precomputations
/// Groth16 verification does once per key).
pub struct LoadedVerifyingKey {
    pub vk: VerifyingKey<Bn254>,
    pub prepared: PreparedVerifyingKey<Bn254>,
    pub blake3_hex: String,
}

impl LoadedVerifyingKey {
    pub fn from_json_str(s: &str, blake3_hex: String) -> Result<Self, VerifierError> {
        let vk = VerifyingKeyJson::from_json_str(s)?.to_verifying_key()?;
        let prepared = prepare_verifying_key(&vk);
        Ok(LoadedVerifyingKey {
            vk,
            prepared,
            blake3_hex,
        })
    }

    /// Read and parse a verification key from disk (§6 `ZEROID_VKEY_PATH`).
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, VerifierError> {
        let artifact = load_artifact_bytes(path)?;
        let s = String::from_utf8_lossy(&artifact.bytes);
        Self::from_json_str(&s, artifact.blake3_hex)
    }

    pub fn public_input_count(&self) -> usize {
        self.vk.gamma_abc_g1.len().saturating_sub(1)
    }
}

/// Verify a Groth16 proof against `vk` for the given public inputs (already
/// parsed field elements, positional per §4.6's `PublicSignals` contract).
/// Synchronous and CPU-bound; callers on an async runtime should run it via
/// `spawn_blocking` (§5) rather than await it directly.
pub fn verify_groth16(
    vk: &LoadedVerifyingKey,
    proof: &Proof<Bn254>,
    public_inputs: &[Fr],
) -> Result<bool, VerifierError> {
    let expected = vk.public_input_count();
    if public_inputs.len() != expected {
        return Err(VerifierError::PublicInputCountMismatch {
            expected,
            got: public_inputs.len(),
        });
    }
    Groth16::<Bn254>::verify_with_processed_vk(&vk.prepared, public_inputs, proof)
        .map_err(|_| VerifierError::MalformedG1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_groth16::Groth16;
    use ark_relations::r1cs::{
        ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable,
    };
    use ark_std::test_rng;

    /// A trivial circuit proving knowledge of `x` such that `x * x = y` for
    /// public input `y`, just enough to exercise a real Groth16 setup/prove/
    /// verify round trip through this crate's JSON boundary.
    struct SquareCircuit {
        x: Option<Fr>,
        y: Option<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for SquareCircuit {
        fn generate_constraints(
            self,
            cs: ConstraintSystemRef<Fr>,
        ) -> Result<(), SynthesisError> {
            let x = cs.new_witness_variable(|| self.x.ok_or(SynthesisError::AssignmentMissing))?;
            let y = cs.new_input_variable(|| self.y.ok_or(SynthesisError::AssignmentMissing))?;
            cs.enforce_constraint(
                ark_relations::lc!() + x,
                ark_relations::lc!() + x,
                ark_relations::lc!() + y,
            )?;
            let _ = Variable::One;
            Ok(())
        }
    }

    fn setup() -> (VerifyingKey<Bn254>, ark_groth16::ProvingKey<Bn254>) {
        let mut rng = test_rng();
        let circuit = SquareCircuit { x: None, y: None };
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit, &mut rng)
            .expect("groth16 setup");
        (vk, pk)
    }

    #[test]
    fn json_round_trip_preserves_the_verifying_key() {
        let (vk, _pk) = setup();
        let json = VerifyingKeyJson::from_verifying_key(&vk);
        let back = json.to_verifying_key().unwrap();
        assert_eq!(vk.alpha_g1, back.alpha_g1);
        assert_eq!(vk.beta_g2, back.beta_g2);
        assert_eq!(vk.gamma_g2, back.gamma_g2);
        assert_eq!(vk.delta_g2, back.delta_g2);
        assert_eq!(vk.gamma_abc_g1, back.gamma_abc_g1);
    }

    #[test]
    fn prove_then_verify_through_the_json_boundary() {
        let (vk, pk) = setup();
        let mut rng = test_rng();
        let x = Fr::from(9u64);
        let y = Fr::from(81u64);
        let circuit = SquareCircuit {
            x: Some(x),
            y: Some(y),
        };
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).expect("proving succeeds");

        let proof_json = ProofJson::from_proof(&proof);
        let reparsed_proof = proof_json.to_proof().unwrap();

        let vk_json = VerifyingKeyJson::from_verifying_key(&vk);
        let loaded = LoadedVerifyingKey::from_json_str(
            &serde_json::to_string(&vk_json).unwrap(),
            "test".to_string(),
        )
        .unwrap();

        assert!(verify_groth16(&loaded, &reparsed_proof, &[y]).unwrap());
    }

    #[test]
    fn verification_fails_for_the_wrong_public_input() {
        let (vk, pk) = setup();
        let mut rng = test_rng();
        let circuit = SquareCircuit {
            x: Some(Fr::from(9u64)),
            y: Some(Fr::from(81u64)),
        };
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).expect("proving succeeds");

        let vk_json = VerifyingKeyJson::from_verifying_key(&vk);
        let loaded = LoadedVerifyingKey::from_json_str(
            &serde_json::to_string(&vk_json).unwrap(),
            "test".to_string(),
        )
        .unwrap();

        assert!(!verify_groth16(&loaded, &proof, &[Fr::from(82u64)]).unwrap());
    }

    #[test]
    fn rejects_wrong_public_input_count() {
        let (vk, pk) = setup();
        let mut rng = test_rng();
        let circuit = SquareCircuit {
            x: Some(Fr::from(9u64)),
            y: Some(Fr::from(81u64)),
        };
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).expect("proving succeeds");
        let vk_json = VerifyingKeyJson::from_verifying_key(&vk);
        let loaded = LoadedVerifyingKey::from_json_str(
            &serde_json::to_string(&vk_json).unwrap(),
            "test".to_string(),
        )
        .unwrap();

        let err = verify_groth16(&loaded, &proof, &[Fr::from(1u64), Fr::from(2u64)]).unwrap_err();
        assert!(matches!(
            err,
            VerifierError::PublicInputCountMismatch { .. }
        ));
    }
}
