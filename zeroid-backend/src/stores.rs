//! Encrypted KV / Doc / Event stores over `sled` (§4.2, §4.4, §6).
//!
//! Three shapes, all opened from the same `sled::Db`:
//!
//! - [`EncryptedKv`] — a fully opaque blob store: every value is
//!   AES-GCM-encrypted under a per-store key derived via HKDF before it
//!   touches disk (escrow entries, the L2 proof cache, nullifier records).
//!   The persisted envelope shape (`{enc, iv, tag, alg}`, hex-encoded) is
//!   the one §6 documents for the escrow KV specifically, and is reused
//!   here for every `EncryptedKv` instance rather than inventing a second
//!   layout.
//! - [`DocStore`] — a queryable-index document store: the credential and
//!   verification-record documents keep index fields (`boundAddress`,
//!   `level`, `status`, ...) in the clear and push only the genuinely
//!   sensitive fields into an embedded [`StoredEnvelope`] (§4.5 step 6).
//! - [`EventStore`] — an append-only encrypted log keyed by `sled`'s
//!   monotonically increasing id generator, giving concurrent appends
//!   distinct, totally-ordered positions (§5) without a separate sequence
//!   counter.

use rand::rngs::OsRng;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use thiserror::Error;
use zeroid_common::aesgcm::{self, AesGcmError, Envelope};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("decryption failed: {0}")]
    Decrypt(#[from] AesGcmError),
}

/// The on-disk envelope shape (§6): hex-encoded `{enc, iv, tag, alg}`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StoredEnvelope {
    pub enc: String,
    pub iv: String,
    pub tag: String,
    pub alg: String,
}

const ALG_NAME: &str = "aes-256-gcm";

impl StoredEnvelope {
    pub fn from_envelope(env: &Envelope) -> Self {
        let (iv, enc, tag) = env.to_hex_parts();
        StoredEnvelope {
            enc,
            iv,
            tag,
            alg: ALG_NAME.to_string(),
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, StoreError> {
        Ok(Envelope::from_hex_parts(&self.iv, &self.enc, &self.tag)?)
    }
}

fn encrypt_value<T: Serialize>(key: &[u8; 32], value: &T) -> Result<Vec<u8>, StoreError> {
    let plaintext = serde_json::to_vec(value)?;
    let mut rng = OsRng;
    let envelope = aesgcm::encrypt(key, &plaintext, &mut rng);
    Ok(serde_json::to_vec(&StoredEnvelope::from_envelope(&envelope))?)
}

fn decrypt_value<T: DeserializeOwned>(key: &[u8; 32], stored: &[u8]) -> Result<T, StoreError> {
    let envelope: StoredEnvelope = serde_json::from_slice(stored)?;
    let plaintext = aesgcm::decrypt(key, &envelope.to_envelope()?)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// A fully opaque, store-key-encrypted blob store.
pub struct EncryptedKv {
    tree: sled::Tree,
    key: [u8; 32],
}

impl EncryptedKv {
    pub fn open(db: &sled::Db, name: &str, key: [u8; 32]) -> Result<Self, StoreError> {
        let tree = db.open_tree(name)?;
        Ok(Self { tree, key })
    }

    pub fn put<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = encrypt_value(&self.key, value)?;
        self.tree.insert(key, bytes)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.tree.get(key)? {
            None => Ok(None),
            Some(ivec) => Ok(Some(decrypt_value(&self.key, &ivec)?)),
        }
    }

    /// Direct presence check against the backing tree, never attempting a
    /// decryption as an existence oracle (§9 flags exactly that pattern as
    /// fragile).
    pub fn contains_key(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.tree.contains_key(key)?)
    }

    pub fn remove(&self, key: &[u8]) -> Result<(), StoreError> {
        self.tree.remove(key)?;
        Ok(())
    }

    /// Insert only if `key` is absent, returning whether this call won the
    /// race. Backs the nullifier store's atomic test-and-set (§5): `sled`'s
    /// tree-level compare-and-swap covers the gap a plain
    /// contains-then-insert would leave open under concurrent writers.
    pub fn insert_if_absent<T: Serialize>(
        &self,
        key: &[u8],
        value: &T,
    ) -> Result<bool, StoreError> {
        let bytes = encrypt_value(&self.key, value)?;
        let result = self
            .tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        Ok(result.is_ok())
    }

    /// Iterate all `(key, decrypted value)` pairs. Used by `purge_expired`
    /// (§4.4) and the sybil-uniqueness scan; a decryption failure on one
    /// entry is surfaced per-entry rather than aborting the whole scan.
    pub fn iter<T: DeserializeOwned>(
        &self,
    ) -> impl Iterator<Item = Result<(Vec<u8>, T), StoreError>> + '_ {
        self.tree.iter().map(move |res| {
            let (k, v) = res.map_err(StoreError::from)?;
            let value: T = decrypt_value(&self.key, &v)?;
            Ok((k.to_vec(), value))
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// A plain (non-value-encrypted) document store for records whose index
/// fields must stay queryable; sensitive sub-fields are encrypted by the
/// caller before being embedded in the document (§4.5 step 6).
pub struct DocStore {
    tree: sled::Tree,
}

impl DocStore {
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, StoreError> {
        Ok(Self {
            tree: db.open_tree(name)?,
        })
    }

    pub fn put<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.tree.insert(key, bytes)?;
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.tree.get(key)? {
            None => Ok(None),
            Some(ivec) => Ok(Some(serde_json::from_slice(&ivec)?)),
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.tree.contains_key(key)?)
    }
}

/// An append-only, store-key-encrypted event log (the audit log, §4/§5).
pub struct EventStore {
    kv: EncryptedKv,
    db: sled::Db,
}

impl EventStore {
    pub fn open(db: sled::Db, name: &str, key: [u8; 32]) -> Result<Self, StoreError> {
        let kv = EncryptedKv::open(&db, name, key)?;
        Ok(Self { kv, db })
    }

    /// Append `value`, returning the monotonically increasing sequence
    /// position it was assigned. Concurrent appends receive distinct
    /// positions (§3's audit invariant, §5's ordering guarantee) because
    /// `sled::Db::generate_id` is itself atomic.
    pub fn append<T: Serialize>(&self, value: &T) -> Result<u64, StoreError> {
        let id = self.db.generate_id()?;
        self.kv.put(&id.to_be_bytes(), value)?;
        Ok(id)
    }

    pub fn iter<T: DeserializeOwned>(&self) -> impl Iterator<Item = Result<(u64, T), StoreError>> + '_ {
        self.kv.iter().map(|res| {
            res.map(|(k, v): (Vec<u8>, T)| {
                let mut id_bytes = [0u8; 8];
                id_bytes.copy_from_slice(&k[..8]);
                (u64::from_be_bytes(id_bytes), v)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.kv.len()
    }
}

/// Open (or create) the root `sled::Db` at `data_dir/<name>`, one physical
/// database per logical data directory (escrow, credentials, cache,
/// nullifiers, audit, verifications all live as trees within it).
pub fn open_root_db(data_dir: impl AsRef<Path>) -> Result<sled::Db, StoreError> {
    let path = data_dir.as_ref().join("zeroid.sled");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoreError::Backend(sled::Error::Io(std::io::Error::new(e.kind(), e.to_string())))
        })?;
    }
    Ok(sled::open(path)?)
}
