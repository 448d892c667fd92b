//! Verification record lifecycle (§4.7): the state machine behind
//! `POST /api/v1/verify` and `GET /api/v1/verify/:id`.

use uuid::Uuid;
use zeroid_common::model::{Requirement, VerificationRecord, VerificationStatus};

use crate::stores::{EncryptedKv, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("verification {0} not found")]
    NotFound(String),
    #[error("illegal transition from {from:?} to {to:?}")]
    IllegalTransition {
        from: VerificationStatus,
        to: VerificationStatus,
    },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

fn is_legal_transition(from: VerificationStatus, to: VerificationStatus) -> bool {
    use VerificationStatus::*;
    matches!(
        (from, to),
        (Pending, KycProcessing)
            | (KycProcessing, CredentialIssued)
            | (KycProcessing, Failed)
            | (CredentialIssued, ProofGenerating)
            | (ProofGenerating, ProofReady)
            | (ProofGenerating, Failed)
            | (ProofReady, Verified)
            | (ProofReady, Failed)
    )
}

pub struct VerificationStore {
    kv: EncryptedKv,
}

impl VerificationStore {
    pub fn new(kv: EncryptedKv) -> Self {
        Self { kv }
    }

    pub fn create(&self, user_id: String, requirements: Vec<Requirement>) -> Result<VerificationRecord, StoreError> {
        let now = crate::time::now_ms();
        let record = VerificationRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            requirements,
            status: VerificationStatus::Pending,
            credential_id: None,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.kv.put(record.id.as_bytes(), &record)?;
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<Option<VerificationRecord>, StoreError> {
        self.kv.get(id.as_bytes())
    }

    /// Moves `id` from its current status to `to`, rejecting any transition
    /// not in the forward-only state machine (§4.7).
    pub fn transition(
        &self,
        id: &str,
        to: VerificationStatus,
        credential_id: Option<String>,
    ) -> Result<VerificationRecord, VerificationError> {
        let Some(mut record) = self.kv.get::<VerificationRecord>(id.as_bytes())? else {
            return Err(VerificationError::NotFound(id.to_string()));
        };
        if !is_legal_transition(record.status, to) {
            return Err(VerificationError::IllegalTransition {
                from: record.status,
                to,
            });
        }
        record.status = to;
        if credential_id.is_some() {
            record.credential_id = credential_id;
        }
        record.updated_at_ms = crate::time::now_ms();
        self.kv.put(id.as_bytes(), &record)?;
        Ok(record)
    }
}
