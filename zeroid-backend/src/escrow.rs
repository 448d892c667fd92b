//! Encrypted PII escrow with jurisdiction-bound retention and deferred
//! GDPR crypto-shredding (§4.4).
//!
//! Double encryption: the raw PII is encrypted once under the regulator's
//! key (so only that regulator can ever decrypt it), and the resulting
//! [`zeroid_common::model::EscrowEntry`] is itself encrypted under the
//! store's master-derived key before it touches disk (so a stolen disk
//! image reveals nothing even about which regulator a blob belongs to).

use std::collections::BTreeMap;

use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroid_common::aesgcm::{self, AesGcmError};
use zeroid_common::model::{AuditAction, EscrowEntry, EscrowedPii};

use crate::audit::AuditLog;
use crate::stores::{EncryptedKv, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EscrowError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("escrow entry not found")]
    NotFound,
    #[error("escrow entry has been invalidated")]
    Invalidated,
    #[error("escrow entry has expired")]
    Expired,
    #[error("escrow integrity check failed")]
    IntegrityFailure,
    #[error("decryption failed: {0}")]
    Decrypt(#[from] AesGcmError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Retention windows in whole Julian years (365.25 days), per jurisdiction
/// (§4.4). Unknown jurisdictions fall back to `DEFAULT`.
fn retention_ms(jurisdiction: &str) -> i64 {
    const JULIAN_YEAR_MS: i64 = (365.25 * 24.0 * 60.0 * 60.0 * 1000.0) as i64;
    let years: i64 = match jurisdiction {
        "US" | "EU" | "UK" => 5,
        _ => 5, // DEFAULT
    };
    years * JULIAN_YEAR_MS
}

pub struct EscrowService {
    kv: EncryptedKv,
    audit: std::sync::Arc<AuditLog>,
}

pub struct RotateOutcome {
    pub success: bool,
    pub reason: String,
}

impl EscrowService {
    pub fn new(kv: EncryptedKv, audit: std::sync::Arc<AuditLog>) -> Self {
        Self { kv, audit }
    }

    pub fn put_escrow(
        &self,
        escrow_id: &str,
        raw_pii: &EscrowedPii,
        regulator_key: &[u8; 32],
        regulator_key_id: &str,
        credential_id: &str,
        jurisdiction: &str,
    ) -> Result<(), EscrowError> {
        let plaintext = serde_json::to_vec(raw_pii)?;
        let integrity_hash = hex::encode(Sha256::digest(&plaintext));

        let mut rng = OsRng;
        let blob1 = aesgcm::encrypt(regulator_key, &plaintext, &mut rng);
        let (iv, ciphertext, tag) = blob1.to_hex_parts();

        let now = crate::time::now_ms();
        let entry = EscrowEntry {
            iv,
            ciphertext,
            tag,
            regulator_key_id: regulator_key_id.to_string(),
            credential_id: credential_id.to_string(),
            created_at_ms: now,
            expires_at_ms: now + retention_ms(jurisdiction),
            invalidated: false,
            integrity_hash,
        };

        self.kv.put(escrow_id.as_bytes(), &entry)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("regulatorKeyId".to_string(), regulator_key_id.to_string());
        metadata.insert("jurisdiction".to_string(), jurisdiction.to_string());
        metadata.insert("credentialId".to_string(), credential_id.to_string());
        self.audit
            .record(AuditAction::EscrowCreate, escrow_id, "system", metadata)?;

        Ok(())
    }

    pub fn get_escrow(
        &self,
        escrow_id: &str,
        regulator_key: &[u8; 32],
        actor_id: &str,
    ) -> Result<EscrowedPii, EscrowError> {
        if !self.kv.contains_key(escrow_id.as_bytes())? {
            return Err(EscrowError::NotFound);
        }
        let entry: EscrowEntry = self
            .kv
            .get(escrow_id.as_bytes())?
            .ok_or(EscrowError::NotFound)?;

        if entry.invalidated {
            return Err(EscrowError::Invalidated);
        }
        if crate::time::now_ms() >= entry.expires_at_ms {
            return Err(EscrowError::Expired);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("regulatorKeyId".to_string(), entry.regulator_key_id.clone());
        self.audit
            .record(AuditAction::EscrowAccess, escrow_id, actor_id, metadata)?;

        let envelope = zeroid_common::aesgcm::Envelope::from_hex_parts(
            &entry.iv,
            &entry.ciphertext,
            &entry.tag,
        )?;
        let plaintext = aesgcm::decrypt(regulator_key, &envelope)?;

        let computed_hash = hex::encode(Sha256::digest(&plaintext));
        if computed_hash != entry.integrity_hash {
            return Err(EscrowError::IntegrityFailure);
        }

        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn rotate_escrow(
        &self,
        escrow_id: &str,
        actor_id: &str,
        force_erasure: bool,
    ) -> Result<RotateOutcome, EscrowError> {
        let mut entry: EscrowEntry = self
            .kv
            .get(escrow_id.as_bytes())?
            .ok_or(EscrowError::NotFound)?;

        let now = crate::time::now_ms();
        let has_remaining_retention = now < entry.expires_at_ms;

        if has_remaining_retention && !force_erasure {
            let deadline = iso8601_from_epoch_ms(entry.expires_at_ms);
            let mut metadata = BTreeMap::new();
            metadata.insert("result".to_string(), "deferred".to_string());
            metadata.insert("deadline".to_string(), deadline.clone());
            self.audit
                .record(AuditAction::EscrowRotate, escrow_id, actor_id, metadata)?;
            return Ok(RotateOutcome {
                success: false,
                reason: format!("retention active until {deadline}"),
            });
        }

        // Crypto-shred: encrypt junk under a key that is never stored anywhere.
        let mut rng = OsRng;
        let mut shred_key = [0u8; 32];
        rand_core::RngCore::fill_bytes(&mut rng, &mut shred_key);
        let mut junk = [0u8; 256];
        rand_core::RngCore::fill_bytes(&mut rng, &mut junk);
        let shredded = aesgcm::encrypt(&shred_key, &junk, &mut rng);
        let (iv, ciphertext, tag) = shredded.to_hex_parts();

        entry.iv = iv;
        entry.ciphertext = ciphertext;
        entry.tag = tag;
        entry.invalidated = true;
        entry.integrity_hash = "INVALIDATED".to_string();

        self.kv.put(escrow_id.as_bytes(), &entry)?;

        let mut metadata = BTreeMap::new();
        metadata.insert("result".to_string(), "completed".to_string());
        self.audit
            .record(AuditAction::EscrowRotate, escrow_id, actor_id, metadata)?;

        Ok(RotateOutcome {
            success: true,
            reason: "erased".to_string(),
        })
    }

    pub fn purge_expired(&self) -> Result<usize, EscrowError> {
        let now = crate::time::now_ms();
        let mut expired_ids = Vec::new();
        for item in self.kv.iter::<EscrowEntry>() {
            let (key, entry) = item?;
            if !entry.invalidated && now >= entry.expires_at_ms {
                expired_ids.push(String::from_utf8_lossy(&key).to_string());
            }
        }
        let count = expired_ids.len();
        for id in expired_ids {
            self.rotate_escrow(&id, "system-purge", true)?;
            let mut metadata = BTreeMap::new();
            metadata.insert("reason".to_string(), "retention-expired".to_string());
            self.audit
                .record(AuditAction::EscrowPurge, &id, "system-purge", metadata)?;
        }
        Ok(count)
    }
}

/// Minimal epoch-ms -> `YYYY-MM-DDTHH:MM:SSZ` rendering, just enough for the
/// deferred-rotation deadline message (§4.4 scenario 5); no timezone, no
/// chrono dependency for a single display string.
fn iso8601_from_epoch_ms(epoch_ms: i64) -> String {
    let secs = epoch_ms.div_euclid(1000);
    let days = secs.div_euclid(86_400);
    let time_of_day = secs.rem_euclid(86_400);
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };

    format!("{y:04}-{m:02}-{d:02}T{hour:02}:{minute:02}:{second:02}Z")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::EventStore;
    use zeroid_common::hkdf::derive_store_key;
    use zeroid_common::model::DocumentType;

    fn test_escrow_service() -> EscrowService {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let escrow_key = derive_store_key(b"master", "escrow");
        let audit_key = derive_store_key(b"master", "audit");
        let kv = EncryptedKv::open(&db, "escrow", escrow_key).unwrap();
        let audit = std::sync::Arc::new(AuditLog::new(
            EventStore::open(db, "audit", audit_key).unwrap(),
        ));
        EscrowService::new(kv, audit)
    }

    fn sample_pii() -> EscrowedPii {
        EscrowedPii {
            full_name: "Alice Ng".to_string(),
            date_of_birth: "1990-01-15".to_string(),
            country_code: 840,
            document_type: DocumentType::Passport,
            document_number: "X123".to_string(),
            provider_ref: "stub-ref-1".to_string(),
            verified_at_ms: crate::time::now_ms(),
        }
    }

    #[test]
    fn put_then_get_round_trips_the_pii() {
        let service = test_escrow_service();
        let regulator_key = [7u8; 32];
        service
            .put_escrow(
                "escrow-1",
                &sample_pii(),
                &regulator_key,
                "default",
                "cred-1",
                "US",
            )
            .unwrap();

        let got = service
            .get_escrow("escrow-1", &regulator_key, "regulator-1")
            .unwrap();
        assert_eq!(got.full_name, "Alice Ng");
        assert_eq!(got.country_code, 840);
    }

    #[test]
    fn get_with_wrong_regulator_key_fails() {
        let service = test_escrow_service();
        service
            .put_escrow(
                "escrow-1",
                &sample_pii(),
                &[7u8; 32],
                "default",
                "cred-1",
                "US",
            )
            .unwrap();

        let err = service
            .get_escrow("escrow-1", &[9u8; 32], "regulator-1")
            .unwrap_err();
        assert!(matches!(err, EscrowError::Decrypt(_)));
    }

    #[test]
    fn get_missing_escrow_is_not_found() {
        let service = test_escrow_service();
        let err = service
            .get_escrow("missing", &[7u8; 32], "regulator-1")
            .unwrap_err();
        assert!(matches!(err, EscrowError::NotFound));
    }

    #[test]
    fn rotate_without_force_defers_while_retention_is_active() {
        let service = test_escrow_service();
        service
            .put_escrow(
                "escrow-1",
                &sample_pii(),
                &[7u8; 32],
                "default",
                "cred-1",
                "US",
            )
            .unwrap();

        let outcome = service.rotate_escrow("escrow-1", "actor-1", false).unwrap();
        assert!(!outcome.success);

        // still readable
        assert!(service.get_escrow("escrow-1", &[7u8; 32], "actor-1").is_ok());
    }

    #[test]
    fn forced_rotation_invalidates_and_blocks_future_reads() {
        let service = test_escrow_service();
        let regulator_key = [7u8; 32];
        service
            .put_escrow(
                "escrow-1",
                &sample_pii(),
                &regulator_key,
                "default",
                "cred-1",
                "US",
            )
            .unwrap();

        let outcome = service
            .rotate_escrow("escrow-1", "actor-1", true)
            .unwrap();
        assert!(outcome.success);

        let err = service
            .get_escrow("escrow-1", &regulator_key, "actor-1")
            .unwrap_err();
        assert!(matches!(err, EscrowError::Invalidated));
    }
}
