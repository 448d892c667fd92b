//! Wire and storage data model (§3), including the on-wire decimal-string
//! encoding for field elements and BabyJubJub points required by §6.

use crate::eddsa::{Point, Signature};
use crate::field::{fr_from_decimal, fr_to_decimal};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

fn point_to_pair(p: &Point) -> [String; 2] {
    [fr_to_decimal(&p.x), fr_to_decimal(&p.y)]
}

fn pair_to_point(pair: &[String; 2]) -> Result<Point, String> {
    Ok(Point {
        x: fr_from_decimal(&pair[0]).map_err(|e| e.to_string())?,
        y: fr_from_decimal(&pair[1]).map_err(|e| e.to_string())?,
    })
}

/// `SignedCredential` exactly as it crosses the wire: every field element is
/// a decimal string, every point a two-element string tuple (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialWire {
    pub id: String,
    #[serde(rename = "userSecret")]
    pub user_secret: String,
    #[serde(rename = "credentialHash")]
    pub credential_hash: String,
    pub signature: [String; 3],
    #[serde(rename = "issuerPubKey")]
    pub issuer_pub_key: [String; 2],
    #[serde(rename = "boundAddress", skip_serializing_if = "Option::is_none")]
    pub bound_address: Option<String>,
    pub level: u8,
    #[serde(rename = "issuedAt")]
    pub issued_at: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// In-memory, field-typed form of a signed credential. Converted to
/// [`CredentialWire`] exactly once, at the HTTP boundary.
#[derive(Clone, Debug)]
pub struct SignedCredential {
    pub id: String,
    pub user_secret: Fr,
    pub credential_hash: Fr,
    pub signature: Signature,
    pub issuer_pub_key: Point,
    pub bound_address: Option<String>,
    pub level: u8,
    pub issued_at_ms: i64,
    pub expires_at_ms: i64,
}

impl SignedCredential {
    pub fn to_wire(&self) -> CredentialWire {
        CredentialWire {
            id: self.id.clone(),
            user_secret: fr_to_decimal(&self.user_secret),
            credential_hash: fr_to_decimal(&self.credential_hash),
            signature: [
                fr_to_decimal(&self.signature.r8.x),
                fr_to_decimal(&self.signature.r8.y),
                crate::field::fr_to_decimal(&crate::eddsa::bytes_to_scalar(
                    &crate::eddsa::scalar_to_bytes(&self.signature.s),
                )),
            ],
            issuer_pub_key: point_to_pair(&self.issuer_pub_key),
            bound_address: self.bound_address.clone(),
            level: self.level,
            issued_at: self.issued_at_ms,
            expires_at: self.expires_at_ms,
        }
    }
}

/// Document type accepted by the KYC submission (§3).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    DriversLicense,
    NationalId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KycSubmission {
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: String,
    #[serde(rename = "countryCode")]
    pub country_code: u16,
    #[serde(rename = "documentType")]
    pub document_type: DocumentType,
    #[serde(rename = "documentNumber")]
    pub document_number: String,
    #[serde(rename = "boundAddress", skip_serializing_if = "Option::is_none")]
    pub bound_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KycResult {
    pub submission: KycSubmission,
    pub passed: bool,
    pub confidence: f64,
    #[serde(rename = "providerRef")]
    pub provider_ref: String,
    #[serde(rename = "verifiedAt")]
    pub verified_at_ms: i64,
}

/// Persisted escrow entry (before the store-level double-encryption wrapper
/// described in §3/§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowEntry {
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
    #[serde(rename = "regulatorKeyId")]
    pub regulator_key_id: String,
    #[serde(rename = "credentialId")]
    pub credential_id: String,
    #[serde(rename = "createdAt")]
    pub created_at_ms: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: i64,
    pub invalidated: bool,
    #[serde(rename = "integrityHash")]
    pub integrity_hash: String,
}

/// Raw PII as escrowed (the plaintext `rawPII` payload from §4.4 step 1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscrowedPii {
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: String,
    #[serde(rename = "countryCode")]
    pub country_code: u16,
    #[serde(rename = "documentType")]
    pub document_type: DocumentType,
    #[serde(rename = "documentNumber")]
    pub document_number: String,
    #[serde(rename = "providerRef")]
    pub provider_ref: String,
    #[serde(rename = "verifiedAt")]
    pub verified_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NullifierEntry {
    pub nullifier: String,
    #[serde(rename = "credentialId")]
    pub credential_id: Option<String>,
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "usedAt")]
    pub used_at_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProofCacheEntry {
    #[serde(rename = "proofFingerprint")]
    pub proof_fingerprint: String,
    pub valid: bool,
    pub nullifier: String,
    #[serde(rename = "verifiedAt")]
    pub verified_at_ms: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    EscrowCreate,
    EscrowAccess,
    EscrowRotate,
    EscrowPurge,
    CredentialIssue,
    CredentialBind,
    ProofVerify,
    NullifierRegister,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub action: AuditAction,
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub actor: String,
    pub timestamp: i64,
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Requirement types accepted by `POST /api/v1/verify` (§6).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    AgeGte,
    CountryNot,
    SanctionsClear,
    SybilUnique,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementType,
    pub value: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    KycProcessing,
    CredentialIssued,
    ProofGenerating,
    ProofReady,
    Verified,
    Failed,
}

/// The resource behind `/api/v1/verify` and `/api/v1/verify/:id` (§4.7,
/// supplied by the expanded specification — the distilled spec names the
/// state machine without giving the record an explicit shape).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub requirements: Vec<Requirement>,
    pub status: VerificationStatus,
    #[serde(rename = "credentialId", skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at_ms: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at_ms: i64,
}

/// The versioned positional layout of the KYC circuit's public signals
/// (§4.6): `[issuerPubKey.Ax, issuerPubKey.Ay, requiredAge,
/// restrictedCountryCode, appId, nullifier, credentialHash]`. Parsed out of
/// the raw positional array exactly once, immediately after validation, per
/// §9's re-architecture hint — nothing downstream re-indexes the raw array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicSignalLayout {
    V1,
}

#[derive(Clone, Debug)]
pub struct PublicSignals {
    pub layout: PublicSignalLayout,
    pub issuer_pub_key: (Fr, Fr),
    pub required_age: Fr,
    pub restricted_country_code: Fr,
    pub app_id: Fr,
    pub nullifier: Fr,
    pub credential_hash: Fr,
}

#[derive(Debug, thiserror::Error)]
pub enum PublicSignalsError {
    #[error("expected at least 7 public signals, got {0}")]
    TooShort(usize),
    #[error("public signals contains a value outside the BN254 scalar field")]
    OutOfField,
}

impl PublicSignals {
    /// Parse the positional, decimal-string array the circuit emits.
    /// Indices 4 and 5 MUST be `appId` and `nullifier` respectively under
    /// `V1` (§4.6) — this is the single place that positional assumption is
    /// allowed to appear.
    pub fn from_v1_array(signals: &[String]) -> Result<Self, PublicSignalsError> {
        if signals.len() < 7 {
            return Err(PublicSignalsError::TooShort(signals.len()));
        }
        let parse = |s: &str| fr_from_decimal(s).map_err(|_| PublicSignalsError::OutOfField);
        Ok(PublicSignals {
            layout: PublicSignalLayout::V1,
            issuer_pub_key: (parse(&signals[0])?, parse(&signals[1])?),
            required_age: parse(&signals[2])?,
            restricted_country_code: parse(&signals[3])?,
            app_id: parse(&signals[4])?,
            nullifier: parse(&signals[5])?,
            credential_hash: parse(&signals[6])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_signals_parses_the_documented_layout() {
        let signals: Vec<String> = vec!["1", "2", "30", "408", "99", "555", "777"]
            .into_iter()
            .map(String::from)
            .collect();
        let parsed = PublicSignals::from_v1_array(&signals).unwrap();
        assert_eq!(parsed.app_id, Fr::from(99u64));
        assert_eq!(parsed.nullifier, Fr::from(555u64));
        assert_eq!(parsed.credential_hash, Fr::from(777u64));
    }

    #[test]
    fn public_signals_rejects_short_arrays() {
        let signals: Vec<String> = vec!["1".to_string(); 3];
        assert!(matches!(
            PublicSignals::from_v1_array(&signals),
            Err(PublicSignalsError::TooShort(3))
        ));
    }

    #[test]
    fn credential_wire_round_trips_through_json() {
        let wire = CredentialWire {
            id: "cred-1".into(),
            user_secret: "123".into(),
            credential_hash: "456".into(),
            signature: ["1".into(), "2".into(), "3".into()],
            issuer_pub_key: ["4".into(), "5".into()],
            bound_address: None,
            level: 2,
            issued_at: 1000,
            expires_at: 2000,
        };
        let json = serde_json::to_string(&wire).unwrap();
        let back: CredentialWire = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, wire.id);
        assert_eq!(back.level, wire.level);
    }

    #[test]
    fn point_pair_round_trips() {
        let p = Point {
            x: Fr::from(10u64),
            y: Fr::from(20u64),
        };
        let pair = point_to_pair(&p);
        let back = pair_to_point(&pair).unwrap();
        assert_eq!(p, back);
    }
}
