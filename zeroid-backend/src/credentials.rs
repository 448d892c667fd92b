//! Credential persistence (§4.5 step 6): `boundAddress` and `level` stay
//! queryable in the clear on the document; the genuinely sensitive fields
//! (`credentialHash`, `signature`, `issuerPubKey`) are encrypted inside an
//! embedded envelope before the document is written.
//!
//! `userSecret` itself is never written here at all (§9 open question):
//! only the one-time issuance response carries it, so there is nothing for
//! this store to leak even under compromise of the store master key.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroid_common::aesgcm;
use zeroid_common::model::CredentialWire;

use crate::stores::{DocStore, StoreError, StoredEnvelope};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SensitiveFields {
    credential_hash: String,
    signature: [String; 3],
    issuer_pub_key: [String; 2],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialDocument {
    pub id: String,
    #[serde(rename = "boundAddress")]
    pub bound_address: Option<String>,
    pub level: u8,
    #[serde(rename = "issuedAt")]
    pub issued_at_ms: i64,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: i64,
    sensitive: StoredEnvelope,
}

pub struct CredentialStore {
    docs: DocStore,
    key: [u8; 32],
}

impl CredentialStore {
    pub fn new(docs: DocStore, key: [u8; 32]) -> Self {
        Self { docs, key }
    }

    pub fn put(&self, wire: &CredentialWire) -> Result<(), StoreError> {
        let sensitive = SensitiveFields {
            credential_hash: wire.credential_hash.clone(),
            signature: wire.signature.clone(),
            issuer_pub_key: wire.issuer_pub_key.clone(),
        };
        let plaintext = serde_json::to_vec(&sensitive)?;
        let mut rng = OsRng;
        let envelope = aesgcm::encrypt(&self.key, &plaintext, &mut rng);

        let doc = CredentialDocument {
            id: wire.id.clone(),
            bound_address: wire.bound_address.clone(),
            level: wire.level,
            issued_at_ms: wire.issued_at,
            expires_at_ms: wire.expires_at,
            sensitive: StoredEnvelope::from_envelope(&envelope),
        };
        self.docs.put(wire.id.as_bytes(), &doc)
    }

    pub fn get(&self, id: &str) -> Result<Option<CredentialWire>, StoreError> {
        let Some(doc) = self.docs.get::<CredentialDocument>(id.as_bytes())? else {
            return Ok(None);
        };
        let envelope = doc.sensitive.to_envelope()?;
        let plaintext = aesgcm::decrypt(&self.key, &envelope)?;
        let sensitive: SensitiveFields = serde_json::from_slice(&plaintext)?;

        Ok(Some(CredentialWire {
            id: doc.id,
            user_secret: String::new(),
            credential_hash: sensitive.credential_hash,
            signature: sensitive.signature,
            issuer_pub_key: sensitive.issuer_pub_key,
            bound_address: doc.bound_address,
            level: doc.level,
            issued_at: doc.issued_at_ms,
            expires_at: doc.expires_at_ms,
        }))
    }

    pub fn contains(&self, id: &str) -> Result<bool, StoreError> {
        self.docs.contains_key(id.as_bytes())
    }
}
