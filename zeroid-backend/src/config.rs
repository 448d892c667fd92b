//! Environment-variable-driven configuration (§6), following the backend's
//! `*_ENV` constant convention: one named constant per knob, one documented
//! default, no external config-file format.

use std::env;

pub const API_KEYS_ENV: &str = "ZEROID_API_KEYS";
pub const ISSUER_PRIVATE_KEY_ENV: &str = "ZEROID_ISSUER_PRIVATE_KEY";
pub const KEYS_DIR_ENV: &str = "ZEROID_KEYS_DIR";
pub const DEFAULT_KEYS_DIR: &str = "data/keys";
pub const REGULATOR_KEY_PREFIX: &str = "ZEROID_REGULATOR_KEY_";
pub const STORE_MASTER_KEY_ENV: &str = "ZEROID_STORE_MASTER_KEY";
pub const VKEY_PATH_ENV: &str = "ZEROID_VKEY_PATH";
pub const DATA_DIR_ENV: &str = "ZEROID_DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const SANCTIONS_LIST_ENV: &str = "ZEROID_SANCTIONS_LIST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 3000;
pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const CORS_ORIGIN_ENV: &str = "ZEROID_CORS_ORIGIN";

pub const DEFAULT_ISSUER_KEY_FILE: &str = "issuer.json";

/// Per-API-key token bucket (§5): 100 requests per 60-second window.
pub const RATE_LIMIT_CAPACITY: u32 = 100;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Per-request deadline (§5, §6): requests outstanding longer than this
/// receive a 503 `REQUEST_TIMEOUT` from the timeout layer.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// L1 in-process LRU bound and per-entry TTL (§4.6).
pub const CACHE_L1_CAPACITY: usize = 10_000;
pub const CACHE_TTL_SECS: u64 = 3_600;

/// Default credential TTL (§3): 365 days, in milliseconds.
pub const DEFAULT_CREDENTIAL_TTL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Default Merkle sanctions tree depth (§4.3).
pub const SANCTIONS_TREE_DEPTH: usize = 10;

/// Aggregation endpoint bounds (§4.6, §6).
pub const AGGREGATE_MIN_PROOFS: usize = 1;
pub const AGGREGATE_MAX_PROOFS: usize = 100;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_keys: Vec<String>,
    pub keys_dir: String,
    pub data_dir: String,
    pub vkey_path: Option<String>,
    pub sanctions_list_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    /// Present only when `ZEROID_STORE_MASTER_KEY` was set; absent means an
    /// ephemeral, process-local master key was generated (§6: "ephemeral if
    /// absent (warn)").
    pub store_master_key_was_configured: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let api_keys = env::var(API_KEYS_ENV)
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let keys_dir = env::var(KEYS_DIR_ENV).unwrap_or_else(|_| DEFAULT_KEYS_DIR.to_string());
        let data_dir = env::var(DATA_DIR_ENV).unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());
        let vkey_path = env::var(VKEY_PATH_ENV).ok();
        let sanctions_list_path = env::var(SANCTIONS_LIST_ENV).ok();
        let host = env::var(HOST_ENV).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = env::var(PORT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let cors_origin = env::var(CORS_ORIGIN_ENV).ok();
        let store_master_key_was_configured = env::var(STORE_MASTER_KEY_ENV).is_ok();

        Config {
            api_keys,
            keys_dir,
            data_dir,
            vkey_path,
            sanctions_list_path,
            host,
            port,
            cors_origin,
            store_master_key_was_configured,
        }
    }

    pub fn regulator_key_hex(regulator_id: &str) -> Option<String> {
        env::var(format!("{REGULATOR_KEY_PREFIX}{}", regulator_id.to_ascii_uppercase())).ok()
    }

    pub fn store_master_key_hex() -> Option<String> {
        env::var(STORE_MASTER_KEY_ENV).ok()
    }

    pub fn issuer_private_key_hex() -> Option<String> {
        env::var(ISSUER_PRIVATE_KEY_ENV).ok()
    }
}
