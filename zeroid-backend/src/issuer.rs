//! Credential issuance orchestration (§4.5): sanctions screen → KYC
//! provider → Poseidon hash → EdDSA sign → escrow → persist.

use std::collections::BTreeMap;

use rand_core::RngCore;
use uuid::Uuid;
use zeroid_common::eddsa::{eddsa_sign_poseidon, Point, PrivateKey};
use zeroid_common::field::bytes_to_fr;
use zeroid_common::model::{
    AuditAction, CredentialWire, DocumentType, EscrowedPii, KycSubmission, SignedCredential,
};
use zeroid_common::poseidon::poseidon3;

use crate::audit::AuditLog;
use crate::config::DEFAULT_CREDENTIAL_TTL_MS;
use crate::credentials::CredentialStore;
use crate::escrow::EscrowService;
use crate::keys::RegulatorKeyRing;
use crate::kyc::KycProvider;
use crate::sanctions::SanctionsRegistry;
use crate::time::{age_from_date_of_birth, AgeError};

#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("country {0} is sanctioned")]
    Sanctioned(u16),
    #[error("KYC verification failed with confidence {0:.2}")]
    KycFailed(f64),
    #[error("invalid dateOfBirth: {0}")]
    InvalidAge(#[from] AgeError),
    #[error("escrow error: {0}")]
    Escrow(#[from] crate::escrow::EscrowError),
    #[error("store error: {0}")]
    Store(#[from] crate::stores::StoreError),
    #[error("key error: {0}")]
    Key(#[from] crate::keys::KeyError),
}

pub struct CredentialRequest {
    pub full_name: String,
    pub date_of_birth: String,
    pub country_code: u16,
    pub document_type: DocumentType,
    pub document_number: String,
    pub bound_address: Option<String>,
    pub level: Option<u8>,
}

pub struct IssuedCredential {
    pub credential: CredentialWire,
    pub escrow_id: String,
}

pub struct CredentialIssuer {
    issuer_key: PrivateKey,
    issuer_pub_key: Point,
    sanctions: std::sync::Arc<SanctionsRegistry>,
    kyc: std::sync::Arc<dyn KycProvider>,
    escrow: std::sync::Arc<EscrowService>,
    credentials: std::sync::Arc<CredentialStore>,
    regulator_keys: std::sync::Arc<RegulatorKeyRing>,
    audit: std::sync::Arc<AuditLog>,
}

impl CredentialIssuer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issuer_key: PrivateKey,
        issuer_pub_key: Point,
        sanctions: std::sync::Arc<SanctionsRegistry>,
        kyc: std::sync::Arc<dyn KycProvider>,
        escrow: std::sync::Arc<EscrowService>,
        credentials: std::sync::Arc<CredentialStore>,
        regulator_keys: std::sync::Arc<RegulatorKeyRing>,
        audit: std::sync::Arc<AuditLog>,
    ) -> Self {
        Self {
            issuer_key,
            issuer_pub_key,
            sanctions,
            kyc,
            escrow,
            credentials,
            regulator_keys,
            audit,
        }
    }

    /// Runs the full pipeline. `rawPII` and the drawn `userSecret` never
    /// leave this function frame except as the returned credential's
    /// one-time wire form (§4.5 step 7, §9's PII lifetime decision).
    pub fn issue(&self, req: CredentialRequest) -> Result<IssuedCredential, IssuanceError> {
        if self.sanctions.is_sanctioned(req.country_code) {
            return Err(IssuanceError::Sanctioned(req.country_code));
        }

        let submission = KycSubmission {
            full_name: req.full_name.clone(),
            date_of_birth: req.date_of_birth.clone(),
            country_code: req.country_code,
            document_type: req.document_type,
            document_number: req.document_number.clone(),
            bound_address: req.bound_address.clone(),
            level: req.level,
        };
        let kyc_result = self.kyc.verify(&submission);
        if !kyc_result.passed {
            return Err(IssuanceError::KycFailed(kyc_result.confidence));
        }

        let now = crate::time::now_ms();
        let age = age_from_date_of_birth(&req.date_of_birth, now)?;

        let mut rng = rand::rngs::OsRng;
        let mut secret_bytes = [0u8; 31];
        rng.fill_bytes(&mut secret_bytes);
        let mut padded = [0u8; 32];
        padded[1..].copy_from_slice(&secret_bytes);
        let user_secret = bytes_to_fr(&padded);

        let age_fr = ark_bn254::Fr::from(age as u64);
        let country_fr = ark_bn254::Fr::from(req.country_code as u64);
        let credential_hash = poseidon3(age_fr, country_fr, user_secret);

        let signature = eddsa_sign_poseidon(&self.issuer_key, credential_hash);

        // `countryCode` and `age` are both always present on this path, so the
        // `3 if country&age else 1 if age else 0` rule (§4.5 step 4e)
        // collapses to a fixed 3 unless the caller overrides it.
        let level = req.level.unwrap_or(3);

        let credential_id = Uuid::new_v4().to_string();
        let escrow_id = format!("escrow-{credential_id}");

        let credential = SignedCredential {
            id: credential_id.clone(),
            user_secret,
            credential_hash,
            signature,
            issuer_pub_key: self.issuer_pub_key,
            bound_address: req.bound_address.clone(),
            level,
            issued_at_ms: now,
            expires_at_ms: now + DEFAULT_CREDENTIAL_TTL_MS,
        };
        let wire = credential.to_wire();

        let raw_pii = EscrowedPii {
            full_name: req.full_name,
            date_of_birth: req.date_of_birth,
            country_code: req.country_code,
            document_type: req.document_type,
            document_number: req.document_number,
            provider_ref: kyc_result.provider_ref,
            verified_at_ms: kyc_result.verified_at_ms,
        };
        let regulator_key = self.regulator_keys.get("default")?;
        self.escrow.put_escrow(
            &escrow_id,
            &raw_pii,
            &regulator_key,
            "default",
            &credential_id,
            "US",
        )?;

        self.credentials.put(&wire)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("level".to_string(), level.to_string());
        self.audit
            .record(AuditAction::CredentialIssue, &credential_id, "system", metadata)?;
        if let Some(address) = &wire.bound_address {
            let mut bind_metadata = BTreeMap::new();
            bind_metadata.insert("boundAddress".to_string(), address.clone());
            self.audit
                .record(AuditAction::CredentialBind, &credential_id, "system", bind_metadata)?;
        }

        Ok(IssuedCredential {
            credential: wire,
            escrow_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::IssuerKeyPair;
    use crate::kyc::StubKycProvider;
    use crate::stores::{DocStore, EncryptedKv, EventStore};
    use zeroid_common::hkdf::derive_store_key;

    fn test_issuer() -> CredentialIssuer {
        let db = sled::Config::new().temporary(true).open().unwrap();

        let escrow_key = derive_store_key(b"master", "escrow");
        let audit_key = derive_store_key(b"master", "audit");
        let cred_key = derive_store_key(b"master", "credentials");

        let audit = std::sync::Arc::new(crate::audit::AuditLog::new(
            EventStore::open(db.clone(), "audit", audit_key).unwrap(),
        ));
        let escrow = std::sync::Arc::new(EscrowService::new(
            EncryptedKv::open(&db, "escrow", escrow_key).unwrap(),
            audit.clone(),
        ));
        let credentials = std::sync::Arc::new(CredentialStore::new(
            DocStore::open(&db, "credentials").unwrap(),
            cred_key,
        ));

        std::env::set_var("ZEROID_REGULATOR_KEY_DEFAULT", hex::encode([1u8; 32]));
        let regulator_keys = std::sync::Arc::new(RegulatorKeyRing::new());

        let mut rng = rand::rngs::OsRng;
        let (sk, pk) = zeroid_common::eddsa::eddsa_generate(&mut rng);

        CredentialIssuer::new(
            sk,
            pk,
            std::sync::Arc::new(SanctionsRegistry::from_default_seed()),
            std::sync::Arc::new(StubKycProvider),
            escrow,
            credentials,
            regulator_keys,
            audit,
        )
    }

    fn sample_request(full_name: &str, country_code: u16) -> CredentialRequest {
        CredentialRequest {
            full_name: full_name.to_string(),
            date_of_birth: "1990-01-15".to_string(),
            country_code,
            document_type: DocumentType::Passport,
            document_number: "X123".to_string(),
            bound_address: None,
            level: None,
        }
    }

    #[test]
    fn happy_path_issues_a_verifiable_credential() {
        let issuer = test_issuer();
        let issued = issuer.issue(sample_request("Alice Ng", 840)).unwrap();
        assert_eq!(issued.credential.level, 3);
        assert!(issuer.credentials.contains(&issued.credential.id).unwrap());
    }

    #[test]
    fn sanctioned_country_is_rejected_before_kyc() {
        let issuer = test_issuer();
        let err = issuer.issue(sample_request("Alice Ng", 408)).unwrap_err();
        assert!(matches!(err, IssuanceError::Sanctioned(408)));
    }

    #[test]
    fn kyc_rejection_surfaces_confidence() {
        let issuer = test_issuer();
        let err = issuer.issue(sample_request("REJECT ME", 840)).unwrap_err();
        match err {
            IssuanceError::KycFailed(confidence) => assert!((confidence - 0.15).abs() < 1e-9),
            other => panic!("expected KycFailed, got {other:?}"),
        }
    }

    #[test]
    fn issued_signature_verifies_under_the_issuer_public_key() {
        let issuer = test_issuer();
        let issued = issuer.issue(sample_request("Bob Lee", 840)).unwrap();
        let stored = issuer.credentials.get(&issued.credential.id).unwrap().unwrap();
        assert_eq!(stored.credential_hash, issued.credential.credential_hash);
    }
}
