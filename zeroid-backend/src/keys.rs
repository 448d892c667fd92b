//! Issuer and regulator key material (§5, §6).
//!
//! The issuer key is initialized once at boot and read-only thereafter
//! (§5 "Shared resources"); regulator keys are lazily loaded on first use
//! and cached in a concurrent map keyed by `regulatorId`, since a deployment
//! may configure regulators the service never actually escrows anything
//! under.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use rand::rngs::OsRng;
use zeroid_common::eddsa::{eddsa_generate, Point, PrivateKey};

use crate::config::{Config, DEFAULT_ISSUER_KEY_FILE};

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read/write issuer key at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse persisted issuer key: {0}")]
    Malformed(String),
    #[error("regulator key {0} is not configured")]
    RegulatorKeyMissing(String),
    #[error("regulator key {0} is not valid hex / wrong length: {1}")]
    RegulatorKeyInvalid(String, String),
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedIssuerKey {
    seed_hex: String,
}

/// The issuer's EdDSA key pair, loaded once at boot from
/// `ZEROID_ISSUER_PRIVATE_KEY` or `$ZEROID_KEYS_DIR/issuer.json`, generating
/// and persisting a fresh key the first time neither is present.
pub struct IssuerKeyPair {
    pub private_key: PrivateKey,
    pub public_key: Point,
}

impl IssuerKeyPair {
    pub fn load_or_generate(config: &Config) -> Result<Self, KeyError> {
        if let Some(hex_seed) = Config::issuer_private_key_hex() {
            let private_key = PrivateKey::from_seed_hex(&hex_seed)
                .map_err(|e| KeyError::Malformed(e.to_string()))?;
            let public_key = private_key.public_key();
            return Ok(Self {
                private_key,
                public_key,
            });
        }

        let path = Path::new(&config.keys_dir).join(DEFAULT_ISSUER_KEY_FILE);
        if path.exists() {
            let bytes = fs::read(&path).map_err(|source| KeyError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let persisted: PersistedIssuerKey = serde_json::from_slice(&bytes)
                .map_err(|e| KeyError::Malformed(e.to_string()))?;
            let private_key = PrivateKey::from_seed_hex(&persisted.seed_hex)
                .map_err(|e| KeyError::Malformed(e.to_string()))?;
            let public_key = private_key.public_key();
            tracing::info!(path = %path.display(), "loaded persisted issuer key");
            return Ok(Self {
                private_key,
                public_key,
            });
        }

        tracing::warn!(
            path = %path.display(),
            "no issuer key configured; generating and persisting a new one"
        );
        let mut rng = OsRng;
        let (private_key, public_key) = eddsa_generate(&mut rng);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| KeyError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let persisted = PersistedIssuerKey {
            seed_hex: hex::encode(private_key.seed_bytes()),
        };
        let bytes =
            serde_json::to_vec_pretty(&persisted).expect("issuer key always serializes");
        fs::write(&path, bytes).map_err(|source| KeyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            private_key,
            public_key,
        })
    }
}

/// Lazily-loaded, 32-byte AES-GCM regulator keys, one per `regulatorId`
/// (§4.4, §6 `ZEROID_REGULATOR_KEY_<ID>`). Cached behind a `RwLock` so a
/// repeated escrow read under the same regulator doesn't re-parse hex every
/// time.
pub struct RegulatorKeyRing {
    cache: RwLock<HashMap<String, [u8; 32]>>,
}

impl RegulatorKeyRing {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, regulator_id: &str) -> Result<[u8; 32], KeyError> {
        if let Some(key) = self
            .cache
            .read()
            .expect("regulator key cache poisoned")
            .get(regulator_id)
        {
            return Ok(*key);
        }

        let hex_str = Config::regulator_key_hex(regulator_id)
            .ok_or_else(|| KeyError::RegulatorKeyMissing(regulator_id.to_string()))?;
        let bytes = hex::decode(&hex_str)
            .map_err(|e| KeyError::RegulatorKeyInvalid(regulator_id.to_string(), e.to_string()))?;
        if bytes.len() != 32 {
            return Err(KeyError::RegulatorKeyInvalid(
                regulator_id.to_string(),
                format!("expected 32 bytes, got {}", bytes.len()),
            ));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        self.cache
            .write()
            .expect("regulator key cache poisoned")
            .insert(regulator_id.to_string(), key);
        Ok(key)
    }
}

impl Default for RegulatorKeyRing {
    fn default() -> Self {
        Self::new()
    }
}

/// The 32-byte HKDF master secret stores derive per-name keys from (§4.2,
/// §6). Ephemeral (a fresh random value, process-lifetime only) when
/// `ZEROID_STORE_MASTER_KEY` is absent, with a startup warning — losing this
/// value on restart makes every previously-encrypted store entry
/// unreadable, which is acceptable for local/dev use but never for a real
/// deployment.
pub fn load_store_master_key() -> [u8; 32] {
    if let Some(hex_str) = Config::store_master_key_hex() {
        let bytes = hex::decode(hex_str).expect("ZEROID_STORE_MASTER_KEY must be valid hex");
        assert_eq!(
            bytes.len(),
            32,
            "ZEROID_STORE_MASTER_KEY must decode to exactly 32 bytes"
        );
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        key
    } else {
        tracing::warn!(
            "ZEROID_STORE_MASTER_KEY not set; using an ephemeral master key for this process \
             only. Every encrypted store becomes unreadable across a restart."
        );
        let mut rng = OsRng;
        let mut key = [0u8; 32];
        rand_core::RngCore::fill_bytes(&mut rng, &mut key);
        key
    }
}
